//! The in-memory result of running one candidate (model, prompt, run).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateLogs {
    pub stdout_tail: String,
    pub stderr_tail: String,
}

/// Everything the worker knows about one candidate run once it has
/// either finished, failed, or timed out. Never persisted verbatim —
/// `TaskStore`/`RewardStore` project the parts they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub model: String,
    pub success: bool,
    pub latency_ms: u64,
    pub compile_pass: bool,
    pub test_pass: bool,
    #[serde(default)]
    pub lint_pass: Option<bool>,
    #[serde(default)]
    pub smoke_pass: Option<bool>,
    /// The build tool invoked (`gradlew`, `maven`, `timeout`, ...).
    pub tool: String,
    #[serde(default)]
    pub logs: CandidateLogs,
    #[serde(default)]
    pub artifact_path: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Sanitized relative path -> file bytes, as extracted from the
    /// model's output.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub zip_url: Option<String>,
    #[serde(default)]
    pub zip_notes: Vec<String>,
    #[serde(default)]
    pub missing_components: Vec<String>,
    #[serde(default)]
    pub follow_up_steps: Vec<String>,
    #[serde(default)]
    pub sandbox_root: Option<String>,
    #[serde(default)]
    pub merge_root: Option<String>,
    #[serde(default)]
    pub pending_final: bool,
}

impl CandidateResult {
    /// A synthetic failure record for an exhausted budget — never an
    /// exception, always a value, per the worker's error-handling design.
    pub fn timeout(model: impl Into<String>, budget_ms: u64) -> Self {
        Self {
            model: model.into(),
            success: false,
            latency_ms: budget_ms,
            compile_pass: false,
            test_pass: false,
            lint_pass: None,
            smoke_pass: None,
            tool: "timeout".to_string(),
            logs: CandidateLogs::default(),
            artifact_path: None,
            content: String::new(),
            files: BTreeMap::new(),
            zip_url: None,
            zip_notes: Vec::new(),
            missing_components: Vec::new(),
            follow_up_steps: Vec::new(),
            sandbox_root: None,
            merge_root: None,
            pending_final: false,
        }
    }

    /// Reward per §4.2: 1.0 if tests pass, 0.5 if it at least compiles,
    /// else 0.0.
    pub fn reward(&self) -> f64 {
        if self.test_pass {
            1.0
        } else if self.compile_pass {
            0.5
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_record_is_a_failure() {
        let r = CandidateResult::timeout("llama3:8b", 180_000);
        assert!(!r.success);
        assert_eq!(r.tool, "timeout");
        assert_eq!(r.latency_ms, 180_000);
        assert_eq!(r.reward(), 0.0);
    }

    #[test]
    fn reward_tiers() {
        let mut r = CandidateResult::timeout("m", 0);
        assert_eq!(r.reward(), 0.0);
        r.compile_pass = true;
        assert_eq!(r.reward(), 0.5);
        r.test_pass = true;
        assert_eq!(r.reward(), 1.0);
    }
}
