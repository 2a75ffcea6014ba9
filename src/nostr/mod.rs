// Nostr-specific subsystems: Relay Pool (C3) and the adaptive ingestion
// pipeline's normalization stages, Classifier / Extractor / Spam Filter (C4).

pub mod classifier;
pub mod extractor;
pub mod relay_pool;
pub mod spam_filter;

pub use classifier::{classify, EventCategory, EventClassification};
pub use extractor::{extract, ExtractedContent};
pub use relay_pool::{RelayPool, RelayPoolConfig};
pub use spam_filter::{evaluate_spam, SpamVerdict};
