//! Relational record of tasks. Every status write passes through
//! [`orc_status::guard_write`] before reaching the database, per
//! §4.14/§4.12: "All inbound status writes pass through the
//! StatusNormalizer."

use chrono::{DateTime, Utc};
use orc_status::GuardMode;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("status guard rejected write: {0}")]
    StatusGuard(#[from] orc_status::GuardError),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub task_type: String,
    pub language: Option<String>,
    pub status: String,
    pub model_used: Option<String>,
    pub latency_ms: Option<i64>,
    pub template_ver: Option<String>,
    pub input_json: Value,
    pub output_contract_json: Option<Value>,
    pub routing_hints_json: Option<Value>,
    pub metadata_json: Option<Value>,
    pub error: Option<String>,
    pub traceback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct TaskStore {
    pool: PgPool,
    guard_mode: GuardMode,
}

impl TaskStore {
    pub fn new(pool: PgPool, guard_mode: GuardMode) -> Self {
        Self { pool, guard_mode }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        id: Uuid,
        task_type: &str,
        language: Option<&str>,
        status: &str,
        template_ver: Option<&str>,
        input_json: Value,
        output_contract_json: Option<Value>,
        routing_hints_json: Option<Value>,
        metadata_json: Option<Value>,
    ) -> Result<(), TaskStoreError> {
        let status = orc_status::guard_write(self.guard_mode, status)?;
        sqlx::query(
            "INSERT INTO tasks
             (id, task_type, language, status, template_ver, input_json,
              output_contract_json, routing_hints_json, metadata_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(task_type)
        .bind(language)
        .bind(&status)
        .bind(template_ver)
        .bind(input_json)
        .bind(output_contract_json)
        .bind(routing_hints_json)
        .bind(metadata_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: &str,
        model_used: Option<&str>,
        latency_ms: Option<i64>,
    ) -> Result<(), TaskStoreError> {
        let status = orc_status::guard_write(self.guard_mode, status)?;
        sqlx::query(
            "UPDATE tasks SET status = $2, model_used = COALESCE($3, model_used),
             latency_ms = COALESCE($4, latency_ms), updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&status)
        .bind(model_used)
        .bind(latency_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record an internal failure: status -> error, tail of traceback
    /// persisted (caller must pre-clamp to <= 6 KiB per §7).
    pub async fn mark_error(&self, id: Uuid, error: &str, traceback: &str) -> Result<(), TaskStoreError> {
        let status = orc_status::guard_write(self.guard_mode, "error")?;
        sqlx::query(
            "UPDATE tasks SET status = $2, error = $3, traceback = $4, updated_at = now()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&status)
        .bind(error)
        .bind(traceback)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<TaskRow>, TaskStoreError> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_noncanonical_in_error_mode() {
        // Exercise the guard in isolation (no DB needed): this is the
        // same check `insert`/`update_status` run before touching the
        // pool.
        assert!(orc_status::guard_write(GuardMode::Error, "succeeded").is_err());
        assert_eq!(
            orc_status::guard_write(GuardMode::Fix, "succeeded").unwrap(),
            "done"
        );
    }
}
