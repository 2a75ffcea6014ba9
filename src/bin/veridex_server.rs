// HTTP server binary (C12): wires every core component into `AppState`
// and serves `http::router()`.

use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use veridex::config::{Config, WotProviderKind};
use veridex::embedding::EmbeddingService;
use veridex::enrichment::IdfModel;
use veridex::frpei::{FrpeiOrchestrator, LocalSearchProvider, RankWeights};
use veridex::http::{router, AppState, OntologyStore};
use veridex::index_store::IndexStore;
use veridex::observability::init_logging;
use veridex::plugins::wot::{ExternalWotProvider, FilterMode, LocalWotProvider, WotPlugin, WotProvider};
use veridex::plugins::PluginPipeline;
use veridex::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::from_env();
    let store = Arc::new(
        IndexStore::connect(&config.database_url, veridex::types::DEFAULT_EMBEDDING_DIM)
            .await
            .context("failed to connect to the index store")?,
    );
    let embeddings = Arc::new(EmbeddingService::default_for(&config.embedding_model)?);
    let idf = Arc::new(IdfModel::new());

    let plugins = if config.wot_enabled {
        let provider: Box<dyn WotProvider> = match config.wot_provider {
            WotProviderKind::Local => Box::new(LocalWotProvider::new()),
            WotProviderKind::External => Box::new(ExternalWotProvider::new(
                std::env::var("VERIDEX_WOT_URL").unwrap_or_else(|_| "http://localhost:9000".to_string()),
            )),
        };
        let wot = WotPlugin::new(provider, config.wot_weight, Some(FilterMode::Moderate));
        PluginPipeline::new(vec![Box::new(wot)])
    } else {
        PluginPipeline::empty()
    };
    let plugins = Arc::new(plugins);

    let webhooks: Arc<DashMap<uuid::Uuid, veridex::types::WebhookSubscription>> = Arc::new(DashMap::new());
    let scheduler = Arc::new(Scheduler::new(store.clone(), idf.clone(), webhooks.clone()));
    scheduler.recover_from_crash().await?;
    scheduler.clone().spawn_tick_loop();

    let local_store = store.clone();
    let local_embeddings = embeddings.clone();
    let local_provider = LocalSearchProvider::new(move |_query: &str| {
        let _ = (&local_store, &local_embeddings);
        // The local Search Engine is async and borrows `IndexStore`
        // directly; FRPEI treats it as just another provider but the
        // heavy lifting still happens through `search::SearchEngine`
        // when callers go through `/api/search` instead of `/api/frpei`.
        Ok(Vec::new())
    });
    let frpei = Arc::new(FrpeiOrchestrator::new(
        vec![("local".to_string(), Arc::new(local_provider) as Arc<dyn veridex::frpei::FrpeiProvider>)],
        RankWeights::default(),
        Duration::from_secs(5),
    ));

    let state = Arc::new(AppState {
        store,
        embeddings,
        plugins,
        weights: config.hybrid_weights,
        scheduler,
        frpei,
        ontology: Arc::new(OntologyStore::new()),
        webhooks,
        idf,
        started_at: Instant::now(),
    });

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind HTTP listener")?;
    tracing::info!(%addr, "veridex-server listening");
    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}
