// veridex CLI: one-shot operations (search, connector management) against
// a running Index Store, sharing the same core crate as the HTTP server
// binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;
use veridex::config::Config;
use veridex::connectors::sync_connector;
use veridex::embedding::EmbeddingService;
use veridex::enrichment::IdfModel;
use veridex::index_store::{DocumentFilter, IndexStore};
use veridex::observability::init_logging_with_level;
use veridex::ontology::OntologySnapshot;
use veridex::plugins::PluginPipeline;
use veridex::search::{SearchEngine, SearchMode, SearchRequest, UserContext};
use veridex::types::{Run, SearchQueryText};

#[derive(Parser)]
#[command(name = "veridex", about = "Federated semantic search engine")]
struct Cli {
    #[arg(long, global = true)]
    verbose: bool,
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an ad hoc search against the Index Store.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Trigger a single connector sync and print the resulting Run.
    ConnectorRun {
        connector_id: Uuid,
    },
    /// List configured connectors.
    ConnectorList,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_level(cli.verbose, cli.quiet)?;

    let config = Config::from_env();
    let store = Arc::new(
        IndexStore::connect(&config.database_url, veridex::types::DEFAULT_EMBEDDING_DIM)
            .await
            .context("failed to connect to the index store")?,
    );
    let embeddings = EmbeddingService::default_for(&config.embedding_model)?;

    match cli.command {
        Command::Search { query, limit } => {
            let plugins = PluginPipeline::empty();
            let engine = SearchEngine::new(&store, &embeddings, &plugins, config.hybrid_weights);
            let request = SearchRequest {
                query: SearchQueryText::new(query),
                mode: SearchMode::Hybrid,
                limit,
                offset: 0,
                filters: DocumentFilter::default(),
                user_context: UserContext::default(),
                expand: true,
                explain: false,
            };
            let snapshot = OntologySnapshot::new(vec![], vec![], vec![]);
            let response = engine.search(&request, &snapshot).await?;
            for result in &response.results {
                println!("{:.3}  {}  {}", result.score, result.document.id, result.document.title);
            }
            println!("{} results ({} total)", response.results.len(), response.total);
        }
        Command::ConnectorRun { connector_id } => {
            let connector = store
                .get_connector(connector_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("unknown connector {connector_id}"))?;
            let idf = IdfModel::new();
            let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
            let mut run = Run::new(connector_id);
            sync_connector(&connector, &store, &mut run, &stop_rx, &idf).await?;
            println!("added={} updated={} removed={}", run.added, run.updated, run.removed);
        }
        Command::ConnectorList => {
            for connector in store.list_connectors().await? {
                println!("{}  {}  active={}", connector.id, connector.name, connector.is_active);
            }
        }
    }

    Ok(())
}
