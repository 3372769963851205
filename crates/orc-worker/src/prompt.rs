//! Per-mode prompt construction.
//!
//! Templates mirror `examples/original_source/app/queue.py::_build_prompt`:
//! chat/docs/planner are short role-framed templates, code mode adds
//! package/class hints, repo include hints, and (when the goal requests two
//! or more components) a "MANDATORY FILES" section naming each missing file.

use orc_types::Task;

use crate::components::{component_class_name, detect_requested_components, infer_domain_entity, placement_folder};
use crate::mode::Mode;

const MAX_REPO_HINTS: usize = 4;

fn language_or_default(task: &Task) -> String {
    task.input.language.clone().unwrap_or_else(|| "java".to_string())
}

fn repo_include_hints(task: &Task) -> Vec<String> {
    task.input
        .repo
        .include
        .iter()
        .take(MAX_REPO_HINTS)
        .cloned()
        .collect()
}

fn repo_section(task: &Task) -> String {
    let hints = repo_include_hints(task);
    if hints.is_empty() {
        return String::new();
    }
    format!(
        "\nRelevant repository paths to consider:\n{}\n",
        hints.iter().map(|h| format!("- {h}")).collect::<Vec<_>>().join("\n")
    )
}

fn memory_section(task: &Task) -> String {
    if task.metadata.memory_context_ids.is_empty() {
        return String::new();
    }
    "\nPrior workspace memory is available; prefer consistent naming and structure with it.\n".to_string()
}

fn history_section(task: &Task) -> String {
    if task.metadata.conversation.is_empty() {
        return String::new();
    }
    let tail: Vec<String> = task
        .metadata
        .conversation
        .iter()
        .rev()
        .take(6)
        .rev()
        .map(|turn| turn.to_string())
        .collect();
    format!("\nConversation so far:\n{}\n", tail.join("\n"))
}

fn chat_prompt(task: &Task) -> String {
    format!(
        "You are a helpful, concise assistant having an ongoing conversation with a developer.\n\
         Answer directly and naturally; do not produce source files unless explicitly asked.{}{}\n\
         Latest user message: {}",
        memory_section(task),
        history_section(task),
        task.input.goal
    )
}

fn docs_prompt(task: &Task) -> String {
    format!(
        "You are a senior developer advocate writing clear, accurate documentation.\n\
         Produce well-structured prose (with headings and examples where useful) that explains \
         the following request thoroughly for an engineering audience.{}\n\
         Request: {}",
        repo_section(task),
        task.input.goal
    )
}

fn planner_prompt(task: &Task) -> String {
    format!(
        "You are a staff engineer producing an implementation plan.\n\
         Respond with a numbered list of concrete steps, calling out risks, dependencies, and \
         the order of operations. Do not write full source files.{}\n\
         Goal: {}",
        repo_section(task),
        task.input.goal
    )
}

fn mandatory_files_section(task: &Task, language: &str) -> String {
    let components = detect_requested_components(&task.input.goal);
    if components.len() < 2 {
        return String::new();
    }
    let entity = infer_domain_entity(&task.input.goal);
    let mut lines = vec!["\nMANDATORY FILES: you MUST emit a `File:` marker and fenced code block for EACH of the following:".to_string()];
    for component in &components {
        let class_name = component_class_name(&entity, component);
        let folder = placement_folder(component);
        lines.push(format!(
            "- File: src/main/java/<package>/{folder}/{class_name}.{ext} (component: {component})",
            ext = example_extension(language)
        ));
    }
    lines.push(fence_example(language));
    lines.join("\n")
}

fn example_extension(language: &str) -> &'static str {
    match language {
        "kotlin" => "kt",
        "python" => "py",
        "typescript" => "ts",
        "javascript" => "js",
        "csharp" => "cs",
        "go" => "go",
        "java" => "java",
        _ => "txt",
    }
}

fn fence_for_language(language: &str) -> &'static str {
    match language {
        "kotlin" => "kotlin",
        "python" => "python",
        "typescript" => "typescript",
        "javascript" => "javascript",
        "csharp" => "csharp",
        "go" => "go",
        _ => "java",
    }
}

fn fence_example(language: &str) -> String {
    format!(
        "\nExample format:\nFile: path/to/Example.{ext}\n```{fence}\n<full file contents>\n```\n",
        ext = example_extension(language),
        fence = fence_for_language(language)
    )
}

fn code_prompt(task: &Task) -> String {
    let language = language_or_default(task);
    let package_hint = if language == "java" {
        "Use a conventional Java package under src/main/java and pick class names that match the domain.\n"
    } else {
        ""
    };
    format!(
        "You are a senior {language} engineer generating production-quality source code.{repo}\n\
         {package_hint}\
         {mandatory}\n\
         CRITICAL OUTPUT FORMAT:\n\
         - For every file, emit a line `File: <relative/path>` immediately followed by a fenced \
         code block containing the complete file contents.\n\
         - Do not omit imports, package declarations, or closing braces.\n\
         - Do not include explanatory prose outside of code blocks.\n\n\
         Request: {goal}",
        language = language,
        repo = repo_section(task),
        package_hint = package_hint,
        mandatory = mandatory_files_section(task, &language),
        goal = task.input.goal,
    )
}

/// Build the prompt string for `task` according to its classified `mode`.
/// `Mode::Clarify` has no model prompt — callers must short-circuit before
/// reaching here.
pub fn build_prompt(task: &Task, mode: Mode) -> String {
    match mode {
        Mode::Chat => chat_prompt(task),
        Mode::Docs => docs_prompt(task),
        Mode::Planner => planner_prompt(task),
        Mode::Code => code_prompt(task),
        Mode::Clarify => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::{Constraints, InputSpec, Metadata, RepoSpec, TaskType};

    fn task_with_goal(goal: &str) -> Task {
        Task::new_queued(
            TaskType::Code,
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
    fn code_prompt_includes_output_format_rules() {
        let task = task_with_goal("implement a greeter service");
        let prompt = build_prompt(&task, Mode::Code);
        assert!(prompt.contains("CRITICAL OUTPUT FORMAT"));
        assert!(prompt.contains("File:"));
    }

    #[test]
    fn multi_component_goal_gets_mandatory_files_section() {
        let task = task_with_goal("generate a repository and service for orders");
        let prompt = build_prompt(&task, Mode::Code);
        assert!(prompt.contains("MANDATORY FILES"));
        assert!(prompt.contains("OrderRepository"));
        assert!(prompt.contains("OrderService"));
    }

    #[test]
    fn single_component_goal_has_no_mandatory_section() {
        let task = task_with_goal("implement a utility function");
        let prompt = build_prompt(&task, Mode::Code);
        assert!(!prompt.contains("MANDATORY FILES"));
    }

    #[test]
    fn chat_prompt_includes_goal_verbatim() {
        let task = task_with_goal("hello there");
        let prompt = build_prompt(&task, Mode::Chat);
        assert!(prompt.contains("hello there"));
        assert!(!prompt.contains("CRITICAL OUTPUT FORMAT"));
    }

    #[test]
    fn docs_prompt_requests_prose() {
        let task = task_with_goal("document the payments module");
        let prompt = build_prompt(&task, Mode::Docs);
        assert!(prompt.to_lowercase().contains("documentation"));
    }

    #[test]
    fn planner_prompt_requests_numbered_steps() {
        let task = task_with_goal("plan the migration");
        let prompt = build_prompt(&task, Mode::Planner);
        assert!(prompt.contains("numbered list"));
    }
}
