use super::SharedState;
use crate::error::{CoreError, CoreResult};
use crate::frpei::{self, RankWeights};
use crate::types::{FrpeiCandidate, FrpeiFeedback, FrpeiRequest};
use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

/// `POST /api/frpei/retrieve` (spec §4.10, §4.12).
pub async fn retrieve(State(state): State<SharedState>, Json(request): Json<FrpeiRequest>) -> CoreResult<Json<serde_json::Value>> {
    let snapshot = state.ontology.snapshot();
    let response =
        state.frpei.retrieve(&request, &snapshot).await.map_err(|e| CoreError::ResourceExhausted(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "request_id": response.request_id,
        "results": response.results,
        "provider_stats": response.provider_stats,
        "cached": response.cached,
        "warnings": response.warnings.iter().map(|w| serde_json::json!({"provider": w.provider, "message": w.message})).collect::<Vec<_>>(),
        "rank_log": response.rank_log,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CandidatesBody {
    candidates: Vec<FrpeiCandidate>,
}

/// `POST /api/frpei/enrich` (spec §4.10 stage 4, §4.12): attach ontology
/// entities/topics to an already canonicalized/deduplicated candidate set.
pub async fn enrich(State(state): State<SharedState>, Json(body): Json<CandidatesBody>) -> CoreResult<Json<serde_json::Value>> {
    let snapshot = state.ontology.snapshot();
    let enriched = frpei::enrich_candidates(body.candidates, &snapshot);
    Ok(Json(serde_json::json!({ "candidates": enriched })))
}

#[derive(Debug, Deserialize)]
pub struct RankBody {
    candidates: Vec<FrpeiCandidate>,
    #[serde(default)]
    explain: bool,
}

/// `POST /api/frpei/rank` (spec §4.10 stage 5, §4.12).
pub async fn rank(State(_state): State<SharedState>, Json(body): Json<RankBody>) -> CoreResult<Json<serde_json::Value>> {
    let (ranked, rank_log) = frpei::rank_candidates(body.candidates, &RankWeights::default(), body.explain);
    Ok(Json(serde_json::json!({ "results": ranked, "rank_log": rank_log })))
}

/// `POST /api/frpei/explain` (spec §4.10 stage 5 "explain", §4.12): ranks
/// with explanation forced on and returns only the per-candidate rank log.
pub async fn explain(State(_state): State<SharedState>, Json(body): Json<RankBody>) -> CoreResult<Json<serde_json::Value>> {
    let (_, rank_log) = frpei::rank_candidates(body.candidates, &RankWeights::default(), true);
    Ok(Json(serde_json::json!({ "rank_log": rank_log })))
}

/// `POST /api/frpei/feedback` (spec §4.10 step 6, §4.12): persists the
/// relevance label for future rank-weight tuning.
pub async fn feedback(State(state): State<SharedState>, Json(feedback): Json<FrpeiFeedback>) -> CoreResult<Json<serde_json::Value>> {
    state.store.record_frpei_feedback(feedback.request_id, feedback.candidate_id, feedback.relevance_label).await?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

/// `GET /api/frpei/status` (spec §4.12).
pub async fn status(State(_state): State<SharedState>) -> CoreResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /api/frpei/metrics` (spec §4.12): per-provider circuit-breaker state.
pub async fn metrics(State(state): State<SharedState>) -> CoreResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({ "providers": state.frpei.metrics() })))
}
