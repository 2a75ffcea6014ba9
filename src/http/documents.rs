use super::SharedState;
use crate::error::{CoreError, CoreResult};
use crate::index_store::DocumentFilter;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /api/documents` (spec §4.12 CRUD surface): most-recent documents
/// matching an optional type filter, reusing the Search Engine's edge-case
/// primitive rather than duplicating a recency query here.
pub async fn list(State(state): State<SharedState>, Query(params): Query<ListParams>) -> CoreResult<Json<Vec<crate::types::Document>>> {
    let mut filter = DocumentFilter { user_groups: None, ..Default::default() };
    if let Some(dt) = params.document_type {
        filter.document_types = dt.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    let docs = state.store.recent_documents(&filter, params.limit.min(500)).await.map_err(CoreError::Internal)?;
    Ok(Json(docs))
}

pub async fn get(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<crate::types::Document>> {
    let docs = state.store.fetch_by_ids(&[id]).await.map_err(CoreError::Internal)?;
    docs.into_iter().next().map(Json).ok_or_else(|| CoreError::NotFound(format!("document {id}")))
}

pub async fn remove(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.store.delete(id).await.map_err(CoreError::Internal)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
