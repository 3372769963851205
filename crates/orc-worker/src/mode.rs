//! Deterministic mode classification.
//!
//! Mirrors `examples/original_source/app/queue.py::_infer_mode` and its
//! keyword tables exactly: a task is `clarify` when both a code signal and
//! a non-code signal (doc/planner/chat) are present, otherwise the first
//! matching signal in priority order wins.

use orc_types::{Task, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Docs,
    Planner,
    Code,
    Clarify,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Docs => "docs",
            Self::Planner => "planner",
            Self::Code => "code",
            Self::Clarify => "clarify",
        }
    }
}

const CODE_KEYWORDS: &[&str] = &[
    "implement", "fix", "bug", "refactor", "function", "class", "module", "api", "endpoint",
    "write code", "generate code", "compile", "build", "test", "unit test", "integration test",
    "sql", "schema", "service", "controller", "handler", "repository", "project", "projects",
    "skeleton", "scaffold", "structure", "template", "setup", "zip", "archive", "download",
    "markdown", "file", "files",
];

const DOC_KEYWORDS: &[&str] = &[
    "document", "docs", "documentation", "explain", "tutorial", "guide", "readme", "summary",
    "describe", "notes",
];

const PLANNER_KEYWORDS: &[&str] = &["plan", "outline", "steps", "strategy", "roadmap", "analysis", "approach", "design"];

const CHAT_KEYWORDS: &[&str] = &[
    "hello", "hi", "hey", "greetings", "thanks", "how are", "say", "tell me", "question",
    "what is", "who is", "help me understand", "conversation", "chat",
];

fn any_keyword(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Classify a task's mode. `metadata.mode_hint` short-circuits when it is
/// one of the four overridable modes; `clarify` is never a valid hint since
/// it can only be derived, never declared.
pub fn infer_mode(task: &Task) -> Mode {
    if let Some(hint) = task.metadata.mode_hint.as_deref() {
        match hint.trim().to_lowercase().as_str() {
            "chat" => return Mode::Chat,
            "code" => return Mode::Code,
            "docs" => return Mode::Docs,
            "planner" => return Mode::Planner,
            _ => {}
        }
    }

    let goal_l = task.input.goal.to_lowercase();
    let expected_empty = task
        .output_contract
        .as_ref()
        .map(|oc| oc.expected_files.is_empty())
        .unwrap_or(true);
    let include_empty = task.input.repo.include.is_empty();
    let code_structure = !(expected_empty && include_empty);

    let has_code_keywords = any_keyword(&goal_l, CODE_KEYWORDS);
    let job_type_is_code = matches!(task.task_type, TaskType::Code | TaskType::Test | TaskType::Refactor);
    let mut code_clues = job_type_is_code || code_structure || has_code_keywords;

    let word_count = task.input.goal.split_whitespace().count();
    if job_type_is_code
        && !code_structure
        && !has_code_keywords
        && !task.input.goal.trim().is_empty()
        && word_count <= 8
    {
        code_clues = false;
    }

    let doc_clues = matches!(task.task_type, TaskType::Doc) || any_keyword(&goal_l, DOC_KEYWORDS);
    let planner_clues = matches!(task.task_type, TaskType::Plan) || any_keyword(&goal_l, PLANNER_KEYWORDS);
    let chat_clues = any_keyword(&goal_l, CHAT_KEYWORDS)
        || (!task.input.goal.trim().is_empty() && word_count <= 8 && !code_clues);

    if code_clues && (doc_clues || planner_clues || chat_clues) {
        return Mode::Clarify;
    }
    if code_clues {
        return Mode::Code;
    }
    if doc_clues && !planner_clues {
        return Mode::Docs;
    }
    if planner_clues && !doc_clues {
        return Mode::Planner;
    }
    if chat_clues {
        return Mode::Chat;
    }
    if doc_clues {
        return Mode::Docs;
    }
    if planner_clues {
        return Mode::Planner;
    }
    Mode::Chat
}

/// The fixed clarification message for `Mode::Clarify`, never model-generated.
pub fn clarify_message(task: &Task) -> String {
    let goal = task.input.goal.trim();
    let snippet = if goal.is_empty() { "your request" } else { goal };
    format!(
        "I can either share a code example or answer in plain language. Would you like me to provide code or a conversational reply for: \"{snippet}\"?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::{Constraints, InputSpec, Metadata, OutputContract, RepoSpec};

    fn task_with_goal(task_type: TaskType, goal: &str) -> Task {
        Task::new_queued(
            task_type,
            InputSpec {
                goal: goal.to_string(),
                language: Some("java".into()),
                frameworks: vec![],
                repo: RepoSpec::default(),
                constraints: Constraints::default(),
            },
            None,
            None,
            Metadata::default(),
            "v1",
        )
    }

    #[test]
    fn explicit_code_goal_is_code() {
        let task = task_with_goal(TaskType::Code, "implement a greeter class with a greet method");
        assert_eq!(infer_mode(&task), Mode::Code);
    }

    #[test]
    fn mixed_signals_yield_clarify() {
        let task = task_with_goal(TaskType::Code, "please implement and explain the algorithm step-by-step");
        assert_eq!(infer_mode(&task), Mode::Clarify);
    }

    #[test]
    fn short_chat_greeting_is_chat() {
        let task = task_with_goal(TaskType::Doc, "hello there");
        assert_eq!(infer_mode(&task), Mode::Chat);
    }

    #[test]
    fn doc_goal_without_planner_is_docs() {
        let task = task_with_goal(TaskType::Doc, "please document this module for new engineers");
        assert_eq!(infer_mode(&task), Mode::Docs);
    }

    #[test]
    fn mode_hint_overrides_inference() {
        let mut task = task_with_goal(TaskType::Code, "implement a class");
        task.metadata.mode_hint = Some("chat".to_string());
        assert_eq!(infer_mode(&task), Mode::Chat);
    }

    #[test]
    fn expected_files_force_code_structure() {
        let mut task = task_with_goal(TaskType::Doc, "create it");
        task.output_contract = Some(OutputContract {
            expected_files: vec!["src/main/java/Greeter.java".into()],
            ..Default::default()
        });
        assert_eq!(infer_mode(&task), Mode::Code);
    }

    #[test]
    fn clarify_message_quotes_goal() {
        let task = task_with_goal(TaskType::Code, "build and explain a thing");
        let msg = clarify_message(&task);
        assert!(msg.contains("build and explain a thing"));
    }
}
