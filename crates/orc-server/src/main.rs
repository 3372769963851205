//! Orchestrator HTTP/SSE server.
//!
//! Wires every library crate in this workspace into one process:
//! reads [`Config`] from the environment, optionally connects Postgres
//! and runs migrations, merges the model registry with whatever the
//! model host actually reports, spawns the single-consumer worker
//! loop, and serves the `/v1` API described in §6.

mod error;
mod rate_limit;
mod routes;
mod state;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orc_final_assembler::FinalAssembler;
use orc_model_client::{ModelClient, OllamaClient};
use orc_registry::Registry;
use orc_reward_store::EventLog;
use orc_routing_policy::RoutingPolicy;
use orc_sse_hub::SseHub;
use orc_task_store::TaskStore;
use orc_types::Config;
use orc_worker::{queue::job_queue, Worker};
use orc_workspace_memory::WorkspaceMemoryStore;

use rate_limit::TokenBucketLimiter;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orc_server=info,orc_worker=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());
    tracing::info!(bind_addr = %config.bind_addr, "starting orchestrator server");

    tokio::fs::create_dir_all(&config.workspace_root).await?;
    tokio::fs::create_dir_all(&config.artifacts_dir).await?;
    tokio::fs::create_dir_all(&config.zip_dir).await?;

    let model_client: Arc<dyn ModelClient> = Arc::new(OllamaClient::new(
        config.ollama_host.clone(),
        config.ollama_autopull,
        config.ollama_tag_cache_ttl(),
    ));

    let discovered: Vec<String> = match model_client.tags().await {
        Ok(tags) => tags.into_iter().collect(),
        Err(e) => {
            tracing::warn!(error = %e, "model host unreachable at startup; registry will only hold file-declared models");
            Vec::new()
        }
    };
    let config_models = Registry::load_file(&config.model_registry_path);
    let registry = Arc::new(Registry::from_merge(&config_models, &discovered));
    tracing::info!(models = registry.available_models(None, None).len(), "model registry ready");

    let routing_policy = RoutingPolicy::new(config.bandit_epsilon);
    let sse_hub = SseHub::new();
    let (queue_handle, queue_receiver) = job_queue(sse_hub.clone());
    let reward_log = Arc::new(EventLog::new(config.bandit_store_path.clone()));

    let (task_store, workspace_memory) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = Arc::new(TaskStore::new(pool.clone(), config.status_guard_mode));
            store.run_migrations().await?;
            tracing::info!("connected to task store and ran migrations");

            let uploads_root = std::path::Path::new(&config.workspace_root).join("uploads");
            tokio::fs::create_dir_all(&uploads_root).await?;
            let memory = Arc::new(WorkspaceMemoryStore::new(pool, uploads_root));
            (Some(store), Some(memory))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running without task persistence or workspace memory");
            (None, None)
        }
    };

    let final_assembler = Arc::new(FinalAssembler::new(config.artifacts_dir.clone()));

    let worker = Arc::new(Worker::new(
        model_client,
        registry,
        routing_policy,
        queue_handle.clone(),
        sse_hub.clone(),
        task_store.clone(),
        reward_log.clone(),
        workspace_memory.clone(),
        config.clone(),
    ));
    tokio::spawn(worker.run(queue_receiver));

    let rate_limiter: Arc<dyn rate_limit::RateLimiter> = Arc::new(TokenBucketLimiter::new(config.rl_rps, config.rl_burst));

    let state = AppState {
        queue: queue_handle,
        sse_hub,
        task_store,
        workspace_memory,
        final_assembler,
        reward_log,
        config: config.clone(),
        rate_limiter,
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
