//! Dual-tier reward storage: an append-only JSONL event log on local
//! disk, and a relational `(model, feature_hash)` aggregate used by
//! [`orc-routing-policy`] to rank candidates.
//!
//! Grounded in `examples/original_source/app/bandit_store.py` (the
//! JSONL log) and `app/bandit.py` (the upsert-increment aggregate),
//! with the upsert SQL pattern following the teacher's
//! `agent/learning/decay.rs` (`ON CONFLICT ... DO UPDATE SET`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum RewardStoreError {
    #[error("io error writing reward event log: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("malformed event log line: {0}")]
    Malformed(String),
}

/// One line of the append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardEvent {
    pub ts: DateTime<Utc>,
    pub model: String,
    pub reward: f64,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Per-model aggregate computed by scanning the JSONL log (used for
/// UI-facing listings when no DB aggregate is configured, or to
/// cross-check the relational one).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelStats {
    pub count: u64,
    pub sum: f64,
    pub avg: f64,
    pub last_ts: Option<DateTime<Utc>>,
}

/// The relational aggregate row, keyed by `(model, feature_hash)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BanditAggregate {
    pub model: String,
    pub feature_hash: String,
    pub runs: i64,
    pub reward_sum: f64,
    pub reward_sq_sum: f64,
    pub last_updated: DateTime<Utc>,
}

impl BanditAggregate {
    /// Posterior mean with a Beta-like prior: `(reward_sum +
    /// prior_mean*prior_count) / (runs + prior_count)`.
    pub fn mean(&self, prior_mean: f64, prior_count: f64) -> f64 {
        (self.reward_sum + prior_mean * prior_count) / (self.runs as f64 + prior_count)
    }
}

/// The append-only JSONL event log. Writes are serialized through a
/// mutex (matching the "globally shared, writes serialize" resource
/// policy in §5) and `fsync`'d so a crash loses at most the in-flight
/// write.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn record_event(
        &self,
        model: &str,
        reward: f64,
        meta: serde_json::Value,
    ) -> Result<(), RewardStoreError> {
        let event = RewardEvent {
            ts: Utc::now(),
            model: model.to_string(),
            reward,
            meta,
        };
        let mut line = serde_json::to_string(&event).expect("RewardEvent always serializes");
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Aggregate `{count, sum, avg, last_ts}` per model, tolerating
    /// blank/malformed lines by skipping them.
    pub async fn get_stats(&self) -> Result<std::collections::HashMap<String, ModelStats>, RewardStoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut stats: std::collections::HashMap<String, ModelStats> = std::collections::HashMap::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<RewardEvent>(line) else {
                continue;
            };
            let entry = stats.entry(event.model.clone()).or_default();
            entry.count += 1;
            entry.sum += event.reward;
            entry.last_ts = Some(match entry.last_ts {
                Some(prev) if prev > event.ts => prev,
                _ => event.ts,
            });
        }
        for s in stats.values_mut() {
            s.avg = if s.count > 0 { s.sum / s.count as f64 } else { 0.0 };
        }
        Ok(stats)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Insert one append-only reward row into the relational store.
pub async fn insert_reward_row(
    pool: &PgPool,
    task_id: uuid::Uuid,
    model: &str,
    task_type: Option<&str>,
    feature_hash: Option<&str>,
    reward: f64,
    won: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rewards (task_id, model, task_type, feature_hash, reward, won)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(task_id)
    .bind(model)
    .bind(task_type)
    .bind(feature_hash)
    .bind(reward)
    .bind(won)
    .execute(pool)
    .await?;
    Ok(())
}

/// Upsert-increment the `(model, feature_hash)` aggregate.
pub async fn upsert_stat(
    pool: &PgPool,
    model: &str,
    feature_hash: &str,
    reward: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO bandit_stats (model, feature_hash, runs, reward_sum, reward_sq_sum, last_updated)
         VALUES ($1, $2, 1, $3, $4, now())
         ON CONFLICT (model, feature_hash) DO UPDATE SET
             runs = bandit_stats.runs + 1,
             reward_sum = bandit_stats.reward_sum + EXCLUDED.reward_sum,
             reward_sq_sum = bandit_stats.reward_sq_sum + EXCLUDED.reward_sq_sum,
             last_updated = now()",
    )
    .bind(model)
    .bind(feature_hash)
    .bind(reward)
    .bind(reward * reward)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch the aggregate rows for every candidate model under one
/// feature hash, used by `RoutingPolicy`.
pub async fn get_aggregates(
    pool: &PgPool,
    models: &[String],
    feature_hash: &str,
) -> Result<Vec<BanditAggregate>, sqlx::Error> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, BanditAggregate>(
        "SELECT model, feature_hash, runs, reward_sum, reward_sq_sum, last_updated
         FROM bandit_stats
         WHERE feature_hash = $1 AND model = ANY($2)",
    )
    .bind(feature_hash)
    .bind(models)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_and_aggregate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));

        log.record_event("llama3", 1.0, serde_json::json!({"note": "ok"}))
            .await
            .unwrap();
        log.record_event("llama3", 0.5, serde_json::json!({}))
            .await
            .unwrap();
        log.record_event("phi3", 0.0, serde_json::json!({}))
            .await
            .unwrap();

        let stats = log.get_stats().await.unwrap();
        let llama = stats.get("llama3").unwrap();
        assert_eq!(llama.count, 2);
        assert_eq!(llama.sum, 1.5);
        assert!((llama.avg - 0.75).abs() < 1e-9);
        assert_eq!(stats.get("phi3").unwrap().count, 1);
    }

    #[tokio::test]
    async fn missing_log_file_yields_empty_stats() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("does-not-exist.jsonl"));
        let stats = log.get_stats().await.unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn aggregate_mean_uses_prior() {
        let agg = BanditAggregate {
            model: "m".into(),
            feature_hash: "h".into(),
            runs: 0,
            reward_sum: 0.0,
            reward_sq_sum: 0.0,
            last_updated: Utc::now(),
        };
        // no runs yet: mean collapses to the prior mean
        assert!((agg.mean(0.5, 1.0) - 0.5).abs() < 1e-9);
    }
}
