//! Task lifecycle endpoints: submit, status, cancel, final payload,
//! SSE stream, zip download. One handler per operation in §6.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orc_sse_hub::Frame;
use orc_status::Status;
use orc_types::{InputSpec, Metadata, OutputContract, RoutingHints, Task, TaskType};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TaskSubmission {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub input: InputSpec,
    #[serde(default)]
    pub output_contract: Option<OutputContract>,
    #[serde(default)]
    pub routing_hints: Option<RoutingHints>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "default_template_ver")]
    pub template_ver: String,
}

fn default_template_ver() -> String {
    "v1".to_string()
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub status: &'static str,
}

/// `POST /v1/tasks` — validate, persist a `queued` row (if a store is
/// configured), enqueue, and publish the initial `queued` SSE frame
/// before returning so a subscriber connecting immediately still sees
/// it per §4.1's "status observable from the instant it is accepted".
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<TaskSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    if body.input.goal.trim().is_empty() {
        return Err(ApiError::BadRequest("input.goal must not be empty".into()));
    }

    let task = Task::new_queued(
        body.task_type,
        body.input,
        body.output_contract,
        body.routing_hints,
        body.metadata,
        body.template_ver,
    );
    let task_id = task.id;

    if let Some(store) = &state.task_store {
        store
            .insert(
                task_id,
                task.task_type.as_str(),
                task.input.language.as_deref(),
                "queued",
                task.template_ver.as_deref(),
                serde_json::to_value(&task.input).unwrap_or_default(),
                task.output_contract.as_ref().map(|v| serde_json::to_value(v).unwrap_or_default()),
                task.routing_hints.as_ref().map(|v| serde_json::to_value(v).unwrap_or_default()),
                Some(serde_json::to_value(&task.metadata).unwrap_or_default()),
            )
            .await
            .map_err(ApiError::from_task_store)?;
    }

    state.sse_hub.publish(task_id, &serde_json::json!({"status": "queued"})).await;

    state
        .queue
        .submit(task)
        .map_err(|_| ApiError::Internal("worker loop is no longer accepting tasks".into()))?;

    Ok((axum::http::StatusCode::ACCEPTED, Json(SubmitResponse { task_id, status: "queued" })))
}

/// `GET /v1/tasks/:id`
pub async fn get_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .task_store
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("task persistence is not configured".into()))?;
    let row = store.get(id).await.map_err(ApiError::from_task_store)?.ok_or(ApiError::NotFound)?;

    let mut payload = serde_json::json!({
        "id": row.id,
        "status": row.status,
        "model_used": row.model_used,
        "latency_ms": row.latency_ms,
        "template_ver": row.template_ver,
        "error": row.error,
    });
    orc_status::normalize_payload(&mut payload);
    Ok(Json(payload))
}

/// `POST /v1/tasks/:id/cancel` — always answers `200 {"ok": true}`,
/// per §4.4: cancellation is best-effort and idempotent. Writes the
/// terminal status directly here (rather than relying on the worker,
/// which may never see this task if it's still sitting in the FIFO
/// queue) and lets `JobQueueHandle::cancel` publish the SSE frame and
/// abort any inflight sub-tasks.
pub async fn cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    if let Some(store) = &state.task_store {
        if let Ok(Some(row)) = store.get(id).await {
            let current: Status = row.status.parse().unwrap_or(Status::Error);
            if !current.is_terminal() {
                let _ = store.update_status(id, "canceled", None, None).await;
            }
        }
    }
    state.queue.cancel(id).await;
    Json(serde_json::json!({"ok": true}))
}

/// `GET /v1/tasks/:id/final` — assembled result, polling the
/// DB/artifact sources up to `SSE_FINAL_WAIT_SECONDS` for a task that
/// hasn't finished yet (§4.13).
pub async fn final_payload(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let deadline = Duration::from_secs(state.config.sse_final_wait_seconds);
    let poll_interval = Duration::from_secs(state.config.sse_db_poll_interval_sec.max(1));

    let payload = state
        .final_assembler
        .assemble_with_retry(state.task_store.as_deref(), id, deadline, poll_interval)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::NotFound)?;

    let mut value = serde_json::to_value(&payload).unwrap_or_default();
    orc_status::normalize_payload(&mut value);
    Ok(Json(value))
}

/// `GET /v1/tasks/:id/zip`
pub async fn download_zip(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse, ApiError> {
    let path = PathBuf::from(&state.config.zip_dir).join(format!("{id}.zip"));
    let bytes = tokio::fs::read(&path).await.map_err(|_| ApiError::NotFound)?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/zip")], bytes))
}

type BoxEventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

struct StreamState {
    hub: Pin<Box<dyn Stream<Item = Frame> + Send>>,
    poll_interval: Duration,
    task_store: Option<std::sync::Arc<orc_task_store::TaskStore>>,
    task_id: Uuid,
    terminal_seen: bool,
    finished: bool,
    pending: VecDeque<Event>,
}

fn is_terminal_payload(value: &serde_json::Value) -> bool {
    value
        .get("status")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<Status>().ok())
        .map(|s| s.is_terminal())
        .unwrap_or(false)
}

/// `GET /v1/tasks/:id/stream` (alias `/sse`) — §4.3's three layers in
/// one handler: an early-exit check for a task whose artifacts already
/// exist, the live hub stream for everything else, and a low-frequency
/// DB poll that synthesizes a terminal frame if the hub closes (worker
/// crash, server restart) without ever emitting one.
pub async fn stream(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let artifact_dir = PathBuf::from(&state.config.artifacts_dir).join(id.to_string());
    if tokio::fs::metadata(&artifact_dir).await.is_ok() {
        let payload = serde_json::json!({"status": "done", "note": "artifacts-present"});
        let events = vec![
            Ok::<Event, Infallible>(Event::default().data(payload.to_string())),
            Ok(Event::default().data("[DONE]")),
        ];
        let boxed: BoxEventStream = Box::pin(futures::stream::iter(events));
        return with_sse_headers(Sse::new(boxed).keep_alive(KeepAlive::default()).into_response());
    }

    let hub_stream = state.sse_hub.stream(id, state.config.sse_heartbeat()).await;
    let init = StreamState {
        hub: Box::pin(hub_stream),
        poll_interval: Duration::from_secs(state.config.sse_db_poll_interval_sec.max(1)),
        task_store: state.task_store.clone(),
        task_id: id,
        terminal_seen: false,
        finished: false,
        pending: VecDeque::new(),
    };

    let events = futures::stream::unfold(init, |mut st| async move {
        loop {
            if let Some(ev) = st.pending.pop_front() {
                return Some((Ok::<Event, Infallible>(ev), st));
            }
            if st.finished {
                return None;
            }

            tokio::select! {
                frame = st.hub.next() => {
                    match frame {
                        Some(Frame::Data(payload)) => {
                            let mut value: serde_json::Value =
                                serde_json::from_str(&payload).unwrap_or_else(|_| serde_json::json!({}));
                            orc_status::normalize_payload(&mut value);
                            let terminal = is_terminal_payload(&value);
                            let ev = Event::default().data(value.to_string());
                            if terminal {
                                st.terminal_seen = true;
                                st.finished = true;
                                st.pending.push_back(Event::default().data("[DONE]"));
                            }
                            return Some((Ok(ev), st));
                        }
                        Some(Frame::Heartbeat) => {
                            return Some((Ok(Event::default().event("heartbeat").data("")), st));
                        }
                        None => {
                            st.finished = true;
                            st.pending.push_back(Event::default().data("[DONE]"));
                            continue;
                        }
                    }
                }
                _ = tokio::time::sleep(st.poll_interval) => {
                    if st.terminal_seen {
                        continue;
                    }
                    if let Some(store) = st.task_store.clone() {
                        if let Ok(Some(row)) = store.get(st.task_id).await {
                            if row.status.parse::<Status>().map(|s| s.is_terminal()).unwrap_or(false) {
                                let mut value = serde_json::json!({
                                    "status": row.status,
                                    "model_used": row.model_used,
                                    "latency_ms": row.latency_ms,
                                });
                                orc_status::normalize_payload(&mut value);
                                st.terminal_seen = true;
                                st.finished = true;
                                st.pending.push_back(Event::default().data("[DONE]"));
                                return Some((Ok(Event::default().data(value.to_string())), st));
                            }
                        }
                    }
                    continue;
                }
            }
        }
    });

    let boxed: BoxEventStream = Box::pin(events);
    with_sse_headers(Sse::new(boxed).keep_alive(KeepAlive::default()).into_response())
}

fn with_sse_headers(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(axum::http::header::CACHE_CONTROL, axum::http::HeaderValue::from_static("no-cache"));
    response
}
