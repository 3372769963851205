//! Process-wide configuration, read once at startup from the
//! environment (§6's "environment-driven config").
//!
//! The teacher reads individual `std::env::var` calls scattered through
//! `ob-poc-web/src/main.rs` with inline `unwrap_or_else` defaults; this
//! centralizes the same pattern into one struct read once by
//! [`Config::from_env`], still backed by plain `std::env::var` — no
//! config-crate dependency.

use std::env;
use std::time::Duration;

use orc_status::GuardMode;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => {
            v.split(',').map(|s| s.trim().to_string()).collect()
        }
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_root: String,
    pub artifacts_dir: String,
    pub zip_dir: String,
    pub bandit_store_path: String,
    pub bandit_epsilon: f64,
    pub force_duel: bool,
    pub candidate_timeout_sec: u64,
    pub duel_timeout_sec: u64,
    pub tot_beam_width: usize,
    pub tot_max_depth: usize,
    pub sse_final_wait_seconds: u64,
    pub sse_db_poll_interval_sec: u64,
    pub sse_heartbeat_seconds: u64,
    pub ollama_host: String,
    pub ollama_autopull: bool,
    pub ollama_tag_cache_ttl_sec: u64,
    pub rl_rps: f64,
    pub rl_burst: u32,
    pub status_guard_mode: GuardMode,
    pub zip_max_files: usize,
    pub zip_max_bytes: u64,
    pub zip_max_file_bytes: u64,
    pub zip_skip_segments: Vec<String>,
    pub zip_skip_suffixes: Vec<String>,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub api_key: Option<String>,
    pub model_registry_path: String,
}

impl Config {
    /// Load a `.env` file (debug builds only, matching the teacher's
    /// `dotenvy` usage) then read every variable into one struct.
    pub fn from_env() -> Self {
        if cfg!(debug_assertions) {
            let _ = dotenvy::dotenv();
        }

        let guard_mode = env::var("STATUS_GUARD_MODE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self {
            workspace_root: env_string("WORKSPACE_ROOT", "./workspace"),
            artifacts_dir: env_string("ARTIFACTS_DIR", "./artifacts"),
            zip_dir: env_string("ZIP_DIR", "./zips"),
            bandit_store_path: env_string("BANDIT_STORE_PATH", "./bandit_events.jsonl"),
            bandit_epsilon: env_f64("BANDIT_EPSILON", 0.1),
            force_duel: env_bool("FORCE_DUEL", false),
            candidate_timeout_sec: env_u64("CANDIDATE_TIMEOUT_SEC", 180),
            duel_timeout_sec: env_u64("DUEL_TIMEOUT_SEC", 120),
            tot_beam_width: env_u64("TOT_BEAM_WIDTH", 2) as usize,
            tot_max_depth: env_u64("TOT_MAX_DEPTH", 3) as usize,
            sse_final_wait_seconds: env_u64("SSE_FINAL_WAIT_SECONDS", 20),
            sse_db_poll_interval_sec: env_u64("SSE_DB_POLL_INTERVAL", 2),
            sse_heartbeat_seconds: env_u64("SSE_HEARTBEAT_SECONDS", 10),
            ollama_host: env_string("OLLAMA_HOST", "http://127.0.0.1:11434"),
            ollama_autopull: env_bool("OLLAMA_AUTOPULL", false),
            ollama_tag_cache_ttl_sec: env_u64("OLLAMA_TAG_CACHE_TTL", 30),
            rl_rps: env_f64("RL_RPS", 5.0),
            rl_burst: env_u64("RL_BURST", 10) as u32,
            status_guard_mode: guard_mode,
            zip_max_files: env_u64("ZIP_MAX_FILES", 400) as usize,
            zip_max_bytes: env_u64("ZIP_MAX_BYTES", 10 * 1024 * 1024),
            zip_max_file_bytes: env_u64("ZIP_MAX_FILE_BYTES", 512 * 1024),
            zip_skip_segments: env_csv(
                "ZIP_SKIP_SEGMENTS",
                &[".git", "node_modules", "target", ".duel", "__pycache__"],
            ),
            zip_skip_suffixes: env_csv("ZIP_SKIP_SUFFIXES", &[".class", ".pyc", ".o"]),
            database_url: env::var("DATABASE_URL").ok(),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
            api_key: env::var("API_KEY").ok(),
            model_registry_path: env_string("MODEL_REGISTRY_PATH", "./config/models.yaml"),
        }
    }

    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_sec)
    }

    pub fn duel_timeout(&self) -> Duration {
        Duration::from_secs(self.duel_timeout_sec)
    }

    pub fn ollama_tag_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.ollama_tag_cache_ttl_sec)
    }

    pub fn sse_heartbeat(&self) -> Duration {
        Duration::from_secs(self.sse_heartbeat_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env() {
        // Avoid mutating the real process environment in tests; build
        // the same way from an empty lookup instead of calling
        // `from_env` directly, since tests run in parallel.
        assert_eq!(env_u64("ORC_TYPES_TEST_UNSET_KEY", 42), 42);
        assert_eq!(env_f64("ORC_TYPES_TEST_UNSET_KEY", 0.1), 0.1);
        assert!(!env_bool("ORC_TYPES_TEST_UNSET_KEY", false));
        assert_eq!(
            env_csv("ORC_TYPES_TEST_UNSET_KEY", &["a", "b"]),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
