use super::SharedState;
use crate::error::{CoreError, CoreResult};
use crate::index_store::DocumentFilter;
use crate::types::{Alias, OntologyTerm, Trigger};
use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

pub async fn list_terms(State(state): State<SharedState>) -> CoreResult<Json<Vec<OntologyTerm>>> {
    Ok(Json(state.ontology.terms.iter().map(|e| e.value().clone()).collect()))
}

pub async fn create_term(State(state): State<SharedState>, Json(mut term): Json<OntologyTerm>) -> CoreResult<Json<OntologyTerm>> {
    term.id = Uuid::new_v4();
    state.ontology.terms.insert(term.id, term.clone());
    Ok(Json(term))
}

pub async fn delete_term(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.ontology.terms.remove(&id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn list_aliases(State(state): State<SharedState>) -> CoreResult<Json<Vec<Alias>>> {
    Ok(Json(state.ontology.aliases.iter().map(|e| e.value().clone()).collect()))
}

pub async fn create_alias(State(state): State<SharedState>, Json(alias): Json<Alias>) -> CoreResult<Json<Alias>> {
    let id = Uuid::new_v4();
    state.ontology.aliases.insert(id, alias.clone());
    Ok(Json(alias))
}

pub async fn delete_alias(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.ontology.aliases.remove(&id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn list_triggers(State(state): State<SharedState>) -> CoreResult<Json<Vec<Trigger>>> {
    Ok(Json(state.ontology.triggers.iter().map(|e| e.value().clone()).collect()))
}

pub async fn create_trigger(State(state): State<SharedState>, Json(mut trigger): Json<Trigger>) -> CoreResult<Json<Trigger>> {
    trigger.id = Uuid::new_v4();
    state.ontology.triggers.insert(trigger.id, trigger.clone());
    Ok(Json(trigger))
}

pub async fn update_trigger(State(state): State<SharedState>, Path(id): Path<Uuid>, Json(mut trigger): Json<Trigger>) -> CoreResult<Json<Trigger>> {
    if !state.ontology.triggers.contains_key(&id) {
        return Err(CoreError::NotFound(format!("trigger {id}")));
    }
    trigger.id = id;
    state.ontology.triggers.insert(id, trigger.clone());
    Ok(Json(trigger))
}

pub async fn delete_trigger(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.ontology.triggers.remove(&id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize, Default)]
pub struct TagQuery {
    #[serde(default)]
    document_type: Option<String>,
}

fn filter_from(params: &TagQuery) -> DocumentFilter {
    let mut filter = DocumentFilter { user_groups: None, ..Default::default() };
    if let Some(dt) = &params.document_type {
        filter.document_types = dt.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    filter
}

/// `GET /api/tags/cloud` (spec §4.12).
pub async fn tag_cloud(State(state): State<SharedState>, axum::extract::Query(params): axum::extract::Query<TagQuery>) -> CoreResult<Json<Vec<(String, u64)>>> {
    let counts = state.store.tag_frequencies(&filter_from(&params)).await.map_err(CoreError::Internal)?;
    let mut pairs: Vec<(String, u64)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(Json(pairs))
}

/// `GET /api/tags/cooccurrence` (spec §4.12).
pub async fn tag_cooccurrence(
    State(state): State<SharedState>,
    axum::extract::Query(params): axum::extract::Query<TagQuery>,
) -> CoreResult<Json<Vec<(String, String, u64)>>> {
    let counts = state.store.tag_cooccurrence(&filter_from(&params)).await.map_err(CoreError::Internal)?;
    let mut pairs: Vec<(String, String, u64)> = counts.into_iter().map(|((a, b), n)| (a, b, n)).collect();
    pairs.sort_by(|a, b| b.2.cmp(&a.2));
    Ok(Json(pairs))
}
