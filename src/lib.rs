// veridex - federated semantic search engine over self-hosted and
// federated content sources (SQL, web, folders, Nostr relays, RSS/podcast
// feeds), built around an Index Store, Ontology-driven query expansion,
// a pluggable scoring Plugin Pipeline (Web of Trust among others), and a
// Federated Retrieval / Plan-Execute-Integrate (FRPEI) orchestrator for
// blending in external search providers.

pub mod config;
pub mod connectors;
pub mod embedding;
pub mod enrichment;
pub mod error;
pub mod frpei;
pub mod http;
pub mod index_store;
pub mod nostr;
pub mod observability;
pub mod ontology;
pub mod plugins;
pub mod scheduler;
pub mod search;
pub mod types;
pub mod webhooks;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use index_store::IndexStore;
