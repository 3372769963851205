pub mod feedback;
pub mod memory;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::rate_limit;
use crate::state::AppState;

/// Build the full HTTP surface: versioned JSON/SSE API under `/v1`,
/// plain zip file serving under `/zips`, tracing and CORS layers
/// wrapping everything — matching the teacher's
/// `ob-poc-web::main`'s `TraceLayer` + permissive `CorsLayer` stack.
pub fn router(state: AppState) -> Router {
    let zip_dir = state.config.zip_dir.clone();

    let v1 = Router::new()
        .route("/tasks", post(tasks::submit))
        .route("/tasks/:id", get(tasks::get_status))
        .route("/tasks/:id/cancel", post(tasks::cancel))
        .route("/tasks/:id/final", get(tasks::final_payload))
        .route("/tasks/:id/stream", get(tasks::stream))
        .route("/tasks/:id/sse", get(tasks::stream))
        .route("/tasks/:id/zip", get(tasks::download_zip))
        .route("/feedback", post(feedback::submit_feedback))
        .route("/memory/upload", post(memory::upload))
        .route("/memory/search", get(memory::search))
        .route("/memory/:id", get(memory::get_one))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit::guard));

    Router::new()
        .nest("/v1", v1)
        .nest_service("/zips", ServeDir::new(zip_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
