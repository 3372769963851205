//! The task shape: what a client submits and what gets persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the kind of work a task requests. Distinct from
/// [`crate::Mode`] in `orc-worker` — this is the caller's declared
/// intent, mode classification is the worker's deterministic inference
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Code,
    Plan,
    Refactor,
    Test,
    Doc,
}

impl TaskType {
    pub fn is_code_like(&self) -> bool {
        matches!(self, Self::Code | Self::Refactor | Self::Test)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Plan => "plan",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Doc => "doc",
        }
    }
}

/// `repo_spec` — which part of a repository to consider context, and
/// what to pull into the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSpec {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub goal: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub repo: RepoSpec,
    #[serde(default)]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputContract {
    #[serde(default)]
    pub expected_files: Vec<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub test_targets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Single,
    Duel,
    TotBeam,
    TieredRefine,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Single
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingHints {
    #[serde(default)]
    pub duel: bool,
    #[serde(default)]
    pub duel_candidates: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
    /// Ordered tier list for [`Strategy::TieredRefine`].
    #[serde(default)]
    pub tiers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Client-declared mode override; one of chat/code/docs/planner.
    /// Anything else is ignored by mode classification.
    #[serde(default)]
    pub mode_hint: Option<String>,
    #[serde(default)]
    pub conversation: Vec<String>,
    #[serde(default)]
    pub memory_context_ids: Vec<Uuid>,
}

/// The full task record as accepted at `POST /v1/tasks` and as persisted
/// (plus the fields a store appends: id, status, model_used, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub input: InputSpec,
    #[serde(default)]
    pub output_contract: Option<OutputContract>,
    #[serde(default)]
    pub routing_hints: Option<RoutingHints>,
    #[serde(default)]
    pub metadata: Metadata,
    pub status: orc_status::Status,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<i64>,
    #[serde(default)]
    pub template_ver: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Construct a freshly-queued task from a client submission.
    pub fn new_queued(
        task_type: TaskType,
        input: InputSpec,
        output_contract: Option<OutputContract>,
        routing_hints: Option<RoutingHints>,
        metadata: Metadata,
        template_ver: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            input,
            output_contract,
            routing_hints,
            metadata,
            status: orc_status::Status::Queued,
            model_used: None,
            latency_ms: None,
            template_ver: Some(template_ver.into()),
            created_at: Utc::now(),
        }
    }

    pub fn language(&self) -> Option<&str> {
        self.input.language.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_code_like() {
        assert!(TaskType::Code.is_code_like());
        assert!(TaskType::Refactor.is_code_like());
        assert!(TaskType::Test.is_code_like());
        assert!(!TaskType::Doc.is_code_like());
        assert!(!TaskType::Plan.is_code_like());
    }

    #[test]
    fn new_queued_defaults() {
        let task = Task::new_queued(
            TaskType::Code,
            InputSpec {
                goal: "write a greeter".into(),
                language: Some("java".into()),
                frameworks: vec![],
                repo: RepoSpec::default(),
                constraints: Constraints::default(),
            },
            None,
            None,
            Metadata::default(),
            "v1",
        );
        assert_eq!(task.status, orc_status::Status::Queued);
        assert!(task.model_used.is_none());
    }
}
