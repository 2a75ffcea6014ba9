use super::SharedState;
use crate::error::{CoreError, CoreResult};
use crate::scheduler::SchedulerError;
use crate::types::{Connector, ConnectorConfig};
use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConnectorPayload {
    name: String,
    config: ConnectorConfig,
    #[serde(default)]
    portal_url: Option<String>,
    #[serde(default)]
    item_url_template: Option<String>,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    schedule_expression: Option<String>,
}

fn default_active() -> bool {
    true
}

pub async fn list(State(state): State<SharedState>) -> CoreResult<Json<Vec<Connector>>> {
    let connectors = state.store.list_connectors().await.map_err(CoreError::Internal)?;
    Ok(Json(connectors))
}

pub async fn get(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<Connector>> {
    state
        .store
        .get_connector(id)
        .await
        .map_err(CoreError::Internal)?
        .map(Json)
        .ok_or_else(|| CoreError::NotFound(format!("connector {id}")))
}

pub async fn create(State(state): State<SharedState>, Json(payload): Json<ConnectorPayload>) -> CoreResult<Json<Connector>> {
    let connector = Connector {
        id: Uuid::new_v4(),
        name: payload.name,
        config: payload.config,
        portal_url: payload.portal_url,
        item_url_template: payload.item_url_template,
        is_active: payload.is_active,
        schedule_expression: payload.schedule_expression,
        last_run_at: None,
        last_run_status: None,
    };
    validate(&connector)?;
    state.store.upsert_connector(&connector).await.map_err(CoreError::Internal)?;
    Ok(Json(connector))
}

pub async fn update(State(state): State<SharedState>, Path(id): Path<Uuid>, Json(payload): Json<ConnectorPayload>) -> CoreResult<Json<Connector>> {
    let existing = state.store.get_connector(id).await.map_err(CoreError::Internal)?.ok_or_else(|| CoreError::NotFound(format!("connector {id}")))?;
    let connector = Connector {
        id,
        name: payload.name,
        config: payload.config,
        portal_url: payload.portal_url,
        item_url_template: payload.item_url_template,
        is_active: payload.is_active,
        schedule_expression: payload.schedule_expression,
        last_run_at: existing.last_run_at,
        last_run_status: existing.last_run_status,
    };
    validate(&connector)?;
    state.store.upsert_connector(&connector).await.map_err(CoreError::Internal)?;
    Ok(Json(connector))
}

fn validate(connector: &Connector) -> CoreResult<()> {
    connector.config.validate().map_err(|errs| CoreError::Validation(errs.join("; ")))
}

pub async fn remove(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    state.store.delete_connector(id).await.map_err(CoreError::Internal)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// `POST /api/connectors/:id/run` (spec §4.11, §4.12): `Conflict` (409) if
/// a run is already in flight for this connector.
pub async fn run(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    match state.scheduler.trigger(id).await {
        Ok(run_id) => Ok(Json(serde_json::json!({ "run_id": run_id }))),
        Err(SchedulerError::AlreadyRunning(_)) => Err(CoreError::Conflict(format!("connector {id} already has a run in flight"))),
        Err(SchedulerError::UnknownConnector(_)) => Err(CoreError::NotFound(format!("connector {id}"))),
    }
}

pub async fn stop(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    let stopped = state.scheduler.stop(id);
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}

pub async fn status(State(state): State<SharedState>, Path(id): Path<Uuid>) -> CoreResult<Json<serde_json::Value>> {
    let run = state.scheduler.status(id).await.map_err(CoreError::Internal)?;
    Ok(Json(serde_json::json!({
        "running": state.scheduler.is_running(id),
        "last_run": run,
    })))
}
