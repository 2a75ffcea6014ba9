use super::SharedState;
use crate::error::CoreResult;
use crate::types::WebhookSubscription;
use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    url: String,
    events: Vec<String>,
    secret: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn list(State(state): State<SharedState>) -> CoreResult<Json<Vec<WebhookSubscription>>> {
    Ok(Json(state.webhooks.iter().map(|e| e.value().clone()).collect()))
}

pub async fn create(State(state): State<SharedState>, Json(payload): Json<WebhookPayload>) -> CoreResult<Json<WebhookSubscription>> {
    let sub = WebhookSubscription { id: Uuid::new_v4(), url: payload.url, events: payload.events, secret: payload.secret, enabled: payload.enabled };
    state.webhooks.insert(sub.id, sub.clone());
    Ok(Json(sub))
}

pub async fn remove(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.webhooks.remove(&id);
    Ok(Json(serde_json::json!({ "deleted": id })))
}
