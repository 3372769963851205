//! Shared application state handed to every axum handler.
//!
//! Mirrors the teacher's `ob-poc-web::state::AppState` shape — one
//! `Clone`-able struct of `Arc`-wrapped resources built once in `main`
//! and threaded through `Router::with_state`.

use std::sync::Arc;

use orc_final_assembler::FinalAssembler;
use orc_reward_store::EventLog;
use orc_sse_hub::SseHub;
use orc_task_store::TaskStore;
use orc_types::Config;
use orc_worker::queue::JobQueueHandle;
use orc_workspace_memory::WorkspaceMemoryStore;

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueueHandle,
    pub sse_hub: SseHub,
    pub task_store: Option<Arc<TaskStore>>,
    pub workspace_memory: Option<Arc<WorkspaceMemoryStore>>,
    pub final_assembler: Arc<FinalAssembler>,
    pub reward_log: Arc<EventLog>,
    pub config: Arc<Config>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}
