//! Workspace memory endpoints: upload a zip bundle, search, fetch one
//! record by id (§4.11).

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use orc_workspace_memory::SEARCH_MAX_LIMIT;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub repo_path: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

fn memory_store(state: &AppState) -> Result<&orc_workspace_memory::WorkspaceMemoryStore, ApiError> {
    state
        .workspace_memory
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("workspace memory is not configured".into()))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let store = memory_store(&state)?;
    let limit = params.limit.unwrap_or(SEARCH_MAX_LIMIT);
    let rows = store
        .search(
            params.repo_path.as_deref(),
            params.language.as_deref(),
            params.q.as_deref(),
            params.session_id.as_deref(),
            limit,
        )
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(rows))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let store = memory_store(&state)?;
    let row = store.get(id).await.map_err(|e| ApiError::Internal(e.to_string()))?.ok_or(ApiError::NotFound)?;
    Ok(Json(row))
}

/// `POST /v1/memory/upload` — multipart form with a `file` (zip), a
/// `session_id`, and an optional `label`.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let store = memory_store(&state)?;

    let mut session_id = String::new();
    let mut label = "upload".to_string();
    let mut zip_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "session_id" => {
                session_id = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            "label" => {
                label = field.text().await.unwrap_or_else(|_| "upload".to_string());
            }
            "file" => {
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                zip_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    if session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("missing session_id field".into()));
    }
    let bytes = zip_bytes.ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;

    let id = store
        .ingest_upload(&bytes, &session_id, &label)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(serde_json::json!({"id": id})))
}
