// HTTP API (C12, spec §4.12): a stateless JSON surface over the Index
// Store, Search Engine, Connector Framework, FRPEI Orchestrator, and the
// ontology/webhook CRUD surfaces, grounded in the teacher's
// `http_server`/`services_http_server` axum routers.

mod connectors;
mod documents;
mod frpei;
mod ontology;
mod search;
mod webhooks;

use crate::embedding::EmbeddingService;
use crate::enrichment::IdfModel;
use crate::frpei::FrpeiOrchestrator;
use crate::index_store::IndexStore;
use crate::ontology::OntologySnapshot;
use crate::plugins::PluginPipeline;
use crate::scheduler::Scheduler;
use crate::types::{Alias, OntologyTerm, Trigger, WebhookSubscription};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// In-memory backing for the ontology/dictionary/trigger/webhook CRUD
/// surfaces; these don't have their own Index Store tables yet, so the
/// HTTP layer owns them directly and rebuilds the `OntologySnapshot` used
/// by Search on every mutation.
pub struct OntologyStore {
    pub terms: DashMap<Uuid, OntologyTerm>,
    pub aliases: DashMap<Uuid, Alias>,
    pub triggers: DashMap<Uuid, Trigger>,
}

impl OntologyStore {
    pub fn new() -> Self {
        Self { terms: DashMap::new(), aliases: DashMap::new(), triggers: DashMap::new() }
    }

    pub fn snapshot(&self) -> OntologySnapshot {
        let terms = self.terms.iter().map(|e| e.value().clone()).collect();
        let aliases = self.aliases.iter().map(|e| e.value().clone()).collect();
        let triggers = self.triggers.iter().map(|e| e.value().clone()).collect();
        OntologySnapshot::new(terms, aliases, triggers)
    }
}

pub struct AppState {
    pub store: Arc<IndexStore>,
    pub embeddings: Arc<EmbeddingService>,
    pub plugins: Arc<PluginPipeline>,
    pub weights: crate::config::HybridWeights,
    pub scheduler: Arc<Scheduler>,
    pub frpei: Arc<FrpeiOrchestrator>,
    pub ontology: Arc<OntologyStore>,
    pub webhooks: Arc<DashMap<Uuid, WebhookSubscription>>,
    pub idf: Arc<IdfModel>,
    pub started_at: Instant,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", get(search::search))
        .route("/api/search/facets", get(search::facets))
        .route("/api/ask", post(search::ask))
        .route("/api/connectors", get(connectors::list).post(connectors::create))
        .route("/api/connectors/:id", get(connectors::get).put(connectors::update).delete(connectors::remove))
        .route("/api/connectors/:id/run", post(connectors::run))
        .route("/api/connectors/:id/stop", post(connectors::stop))
        .route("/api/connectors/:id/status", get(connectors::status))
        .route("/api/documents", get(documents::list))
        .route("/api/documents/:id", get(documents::get).delete(documents::remove))
        .route("/api/webhooks", get(webhooks::list).post(webhooks::create))
        .route("/api/webhooks/:id", delete(webhooks::remove))
        .route("/api/ontology/terms", get(ontology::list_terms).post(ontology::create_term))
        .route("/api/ontology/terms/:id", delete(ontology::delete_term))
        .route("/api/ontology/aliases", get(ontology::list_aliases).post(ontology::create_alias))
        .route("/api/ontology/aliases/:id", delete(ontology::delete_alias))
        .route("/api/triggers", get(ontology::list_triggers).post(ontology::create_trigger))
        .route("/api/triggers/:id", put(ontology::update_trigger).delete(ontology::delete_trigger))
        .route("/api/tags/cloud", get(ontology::tag_cloud))
        .route("/api/tags/cooccurrence", get(ontology::tag_cooccurrence))
        .route("/api/frpei/retrieve", post(frpei::retrieve))
        .route("/api/frpei/enrich", post(frpei::enrich))
        .route("/api/frpei/rank", post(frpei::rank))
        .route("/api/frpei/explain", post(frpei::explain))
        .route("/api/frpei/feedback", post(frpei::feedback))
        .route("/api/frpei/status", get(frpei::status))
        .route("/api/frpei/metrics", get(frpei::metrics))
        .with_state(state)
}

#[derive(Serialize)]
struct CheckResult {
    ok: bool,
    latency_ms: u128,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    checks: std::collections::HashMap<&'static str, CheckResult>,
}

/// `GET /health` (spec §4.12): `status` is `ok` only if every check passes.
async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let db_start = Instant::now();
    let db_ok = state.store.count().await.is_ok();
    let db_check = CheckResult { ok: db_ok, latency_ms: db_start.elapsed().as_millis() };

    let embed_start = Instant::now();
    let embed_ok = state.embeddings.embed("healthcheck").await.is_ok();
    let embed_check = CheckResult { ok: embed_ok, latency_ms: embed_start.elapsed().as_millis() };

    let mut checks = std::collections::HashMap::new();
    let all_ok = db_check.ok && embed_check.ok;
    checks.insert("db", db_check);
    checks.insert("embedding", embed_check);

    let status = if all_ok { "ok" } else { "degraded" };
    let code = if all_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(HealthResponse { status, checks }))
}
