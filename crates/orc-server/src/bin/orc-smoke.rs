//! Local smoke-test CLI.
//!
//! Drives `orc-worker`'s mode classification and prompt construction
//! directly, without a running model host, database, or HTTP server —
//! useful for checking that a goal string lands in the mode and
//! produces the prompt an operator expects before wiring it into a
//! real request.

use clap::{Parser, Subcommand};
use orc_types::{Constraints, InputSpec, Metadata, RepoSpec, RoutingHints, Task, TaskType};
use orc_worker::mode::{clarify_message, infer_mode};
use orc_worker::prompt::build_prompt;

#[derive(Parser)]
#[command(name = "orc-smoke")]
#[command(about = "Local smoke-test for orchestrator mode classification and prompting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a goal string and print the inferred mode.
    Classify {
        goal: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        mode_hint: Option<String>,
    },
    /// Classify, then print the constructed prompt (or the clarify
    /// question, if the goal classifies as ambiguous).
    Prompt {
        goal: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        mode_hint: Option<String>,
    },
}

fn build_task(goal: String, language: Option<String>, mode_hint: Option<String>) -> Task {
    Task::new_queued(
        TaskType::Code,
        InputSpec {
            goal,
            language,
            frameworks: Vec::new(),
            repo: RepoSpec::default(),
            constraints: Constraints::default(),
        },
        None,
        Some(RoutingHints::default()),
        Metadata {
            mode_hint,
            ..Metadata::default()
        },
        "smoke",
    )
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Classify { goal, language, mode_hint } => {
            let task = build_task(goal, language, mode_hint);
            let mode = infer_mode(&task);
            println!("mode: {}", mode.as_str());
        }
        Commands::Prompt { goal, language, mode_hint } => {
            let task = build_task(goal, language, mode_hint);
            let mode = infer_mode(&task);
            println!("mode: {}", mode.as_str());
            if mode == orc_worker::mode::Mode::Clarify {
                println!("---\n{}", clarify_message(&task));
            } else {
                println!("---\n{}", build_prompt(&task, mode));
            }
        }
    }
}
