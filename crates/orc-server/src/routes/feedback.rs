//! `POST /v1/feedback` — human feedback on a completed task, folded
//! into the bandit under a dedicated `"manual"` feature hash so it
//! never collides with a model-scored feature bucket (§4.6).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const MANUAL_FEATURE_HASH: &str = "manual";
const HUMAN_SCORE_WEIGHT: f64 = 0.02;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub task_id: Uuid,
    pub model: String,
    pub success: bool,
    #[serde(default)]
    pub human_score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub artifacts: Option<serde_json::Value>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let human_score = body.human_score.unwrap_or(0.0).clamp(0.0, 5.0);
    let reward = (if body.success { 1.0 } else { 0.0 }) + HUMAN_SCORE_WEIGHT * human_score;

    state
        .reward_log
        .record_event(
            &body.model,
            reward,
            serde_json::json!({
                "task_id": body.task_id.to_string(),
                "feature_hash": MANUAL_FEATURE_HASH,
                "notes": body.notes,
                "human_score": body.human_score,
                "artifacts": body.artifacts,
            }),
        )
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    if let Some(store) = &state.task_store {
        orc_reward_store::insert_reward_row(
            store.pool(),
            body.task_id,
            &body.model,
            None,
            Some(MANUAL_FEATURE_HASH),
            reward,
            body.success,
        )
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

        orc_reward_store::upsert_stat(store.pool(), &body.model, MANUAL_FEATURE_HASH, reward)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    Ok(Json(serde_json::json!({"ok": true})))
}
