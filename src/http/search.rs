use super::SharedState;
use crate::error::{CoreError, CoreResult};
use crate::index_store::{DocumentFilter, Facets};
use crate::search::{SearchEngine, SearchMode, SearchRequest, UserContext};
use crate::types::SearchQueryText;
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    user_pubkey: Option<String>,
    #[serde(default)]
    user_groups: Option<String>,
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default)]
    expand: Option<bool>,
    #[serde(default)]
    explain: Option<bool>,
}

fn parse_mode(raw: Option<&str>) -> SearchMode {
    match raw {
        Some("vector") => SearchMode::Vector,
        Some("text") => SearchMode::Text,
        _ => SearchMode::Hybrid,
    }
}

fn build_request(params: &SearchParams) -> SearchRequest {
    let user_groups: HashSet<String> =
        params.user_groups.as_deref().map(|g| g.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect()).unwrap_or_default();

    let mut filters = DocumentFilter { user_groups: Some(user_groups.clone()), ..Default::default() };
    if let Some(dt) = &params.document_type {
        filters.document_types = dt.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
    }

    SearchRequest {
        query: SearchQueryText::new(params.q.clone()),
        mode: parse_mode(params.mode.as_deref()),
        limit: params.limit.unwrap_or(20).min(200),
        offset: params.offset.unwrap_or(0),
        filters,
        user_context: UserContext { user_groups, user_pubkey: params.user_pubkey.clone() },
        expand: params.expand.unwrap_or(true),
        explain: params.explain.unwrap_or(false),
    }
}

/// `GET /api/search` (spec §4.12, §4.8).
pub async fn search(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> CoreResult<Json<serde_json::Value>> {
    let request = build_request(&params);
    let snapshot = state.ontology.snapshot();
    let engine = SearchEngine::new(&state.store, &state.embeddings, &state.plugins, state.weights);
    let response = engine.search(&request, &snapshot).await.map_err(CoreError::Internal)?;
    Ok(Json(serde_json::to_value(response).map_err(|e| CoreError::Internal(e.into()))?))
}

/// `GET /api/search/facets` (spec §4.12): facets alone, over the same
/// filter surface as search.
pub async fn facets(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> CoreResult<Json<Facets>> {
    let request = build_request(&params);
    let facets = state.store.facets(&request.filters).await.map_err(CoreError::Internal)?;
    Ok(Json(facets))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    question: String,
    #[serde(default = "default_ask_limit")]
    limit: usize,
    #[serde(default)]
    user_pubkey: Option<String>,
}

fn default_ask_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    question: String,
    context_documents: Vec<crate::types::Document>,
    note: &'static str,
}

/// `POST /api/ask` (spec §4.12): runs Search, attaches the top `limit` docs
/// as RAG context. Generation itself is delegated to an external LLM the
/// caller invokes with this context — this endpoint does not call one.
pub async fn ask(State(state): State<SharedState>, Json(req): Json<AskRequest>) -> CoreResult<Json<AskResponse>> {
    let params = SearchParams {
        q: req.question.clone(),
        mode: None,
        limit: Some(req.limit),
        offset: Some(0),
        user_pubkey: req.user_pubkey,
        user_groups: None,
        document_type: None,
        expand: Some(true),
        explain: Some(false),
    };
    let request = build_request(&params);
    let snapshot = state.ontology.snapshot();
    let engine = SearchEngine::new(&state.store, &state.embeddings, &state.plugins, state.weights);
    let response = engine.search(&request, &snapshot).await.map_err(CoreError::Internal)?;

    Ok(Json(AskResponse {
        question: req.question,
        context_documents: response.results.into_iter().map(|r| r.document).collect(),
        note: "generation is performed by an external LLM using these documents as context",
    }))
}
