//! Running one candidate: stream a model's output, extract files, sandbox
//! them to disk, and validate.
//!
//! The "typed result, never an exception" shape (a timed-out or failed
//! candidate still returns a [`CandidateResult`]) mirrors how
//! `examples/original_source/app/queue.py`'s `_runner` treats each
//! candidate coroutine — `asyncio.wait_for` timeouts are caught and
//! converted into a result record rather than propagated.

use std::path::Path;
use std::time::{Duration, Instant};

use futures::StreamExt;
use orc_types::{CandidateLogs, CandidateResult};
use uuid::Uuid;

use orc_fs_sandbox::FsSandbox;
use orc_model_client::{GenerateOptions, ModelClient};

use crate::extract::{extract_files_from_content, sanitize_java};
use crate::validate::{build_and_test_java, validate_non_java};

fn is_java(language: &str) -> bool {
    language.eq_ignore_ascii_case("java")
}

async fn write_files_to_sandbox(
    sandbox: &FsSandbox,
    files: &std::collections::BTreeMap<String, Vec<u8>>,
) -> std::io::Result<()> {
    for (rel_path, bytes) in files {
        let Ok(abs) = sandbox.resolve_checked(rel_path) else {
            tracing::warn!(rel_path, "skipping file that would escape candidate sandbox");
            continue;
        };
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&abs, bytes).await?;
    }
    Ok(())
}

async fn stream_generation(
    model_client: &dyn ModelClient,
    model: &str,
    prompt: &str,
) -> Result<String, String> {
    let mut stream = model_client
        .generate_stream(model, prompt, GenerateOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        content.push_str(&chunk.response);
    }
    Ok(content)
}

/// Run `model` against `prompt` under `budget`, writing any extracted
/// files under a fresh subdirectory of `sandbox_base`. Never returns an
/// error: every failure mode (model unavailable, timeout, no files
/// produced) is encoded into the returned [`CandidateResult`].
pub async fn run_candidate(
    model_client: &dyn ModelClient,
    model: &str,
    prompt: &str,
    language: &str,
    sandbox_base: &Path,
    budget: Duration,
) -> CandidateResult {
    let start = Instant::now();

    if let Err(e) = model_client.ensure(model).await {
        return CandidateResult {
            model: model.to_string(),
            success: false,
            latency_ms: start.elapsed().as_millis() as u64,
            compile_pass: false,
            test_pass: false,
            lint_pass: None,
            smoke_pass: None,
            tool: "ensure-failed".to_string(),
            logs: CandidateLogs { stdout_tail: String::new(), stderr_tail: e.to_string() },
            artifact_path: None,
            content: String::new(),
            files: Default::default(),
            zip_url: None,
            zip_notes: vec![],
            missing_components: vec![],
            follow_up_steps: vec![],
            sandbox_root: None,
            merge_root: None,
            pending_final: false,
        };
    }

    let content = match tokio::time::timeout(budget, stream_generation(model_client, model, prompt)).await {
        Ok(Ok(content)) => content,
        Ok(Err(e)) => {
            let mut result = CandidateResult::timeout(model, start.elapsed().as_millis() as u64);
            result.tool = "generate-failed".to_string();
            result.logs.stderr_tail = e;
            return result;
        }
        Err(_) => return CandidateResult::timeout(model, budget.as_millis() as u64),
    };

    let mut files = extract_files_from_content(&content);
    if is_java(language) {
        for (rel_path, bytes) in files.iter_mut() {
            let code = String::from_utf8_lossy(bytes).to_string();
            *bytes = sanitize_java(&code, rel_path).into_bytes();
        }
    }

    let candidate_dir = sandbox_base.join(Uuid::new_v4().to_string());
    if let Err(e) = tokio::fs::create_dir_all(&candidate_dir).await {
        let mut result = CandidateResult::timeout(model, start.elapsed().as_millis() as u64);
        result.tool = "sandbox-setup-failed".to_string();
        result.logs.stderr_tail = e.to_string();
        return result;
    }

    let sandbox = match FsSandbox::new(&candidate_dir) {
        Ok(s) => s,
        Err(e) => {
            let mut result = CandidateResult::timeout(model, start.elapsed().as_millis() as u64);
            result.tool = "sandbox-setup-failed".to_string();
            result.logs.stderr_tail = e.to_string();
            return result;
        }
    };

    if let Err(e) = write_files_to_sandbox(&sandbox, &files).await {
        tracing::warn!(error = %e, "error writing candidate files to sandbox");
    }

    let outcome = if is_java(language) {
        build_and_test_java(sandbox.root()).await
    } else {
        validate_non_java(!files.is_empty())
    };

    CandidateResult {
        model: model.to_string(),
        success: outcome.compile_pass,
        latency_ms: start.elapsed().as_millis() as u64,
        compile_pass: outcome.compile_pass,
        test_pass: outcome.test_pass,
        lint_pass: None,
        smoke_pass: None,
        tool: outcome.tool,
        logs: CandidateLogs {
            stdout_tail: outcome.stdout_tail,
            stderr_tail: outcome.stderr_tail,
        },
        artifact_path: None,
        content,
        files,
        zip_url: None,
        zip_notes: vec![],
        missing_components: vec![],
        follow_up_steps: vec![],
        sandbox_root: Some(sandbox.root().to_string_lossy().to_string()),
        merge_root: None,
        pending_final: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orc_model_client::{GenerateChunk, ModelClientError};
    use std::collections::HashSet;
    use std::pin::Pin;

    struct StaticModel {
        content: String,
        available: bool,
    }

    #[async_trait]
    impl ModelClient for StaticModel {
        async fn tags(&self) -> Result<HashSet<String>, ModelClientError> {
            Ok(HashSet::new())
        }

        async fn ensure(&self, _model: &str) -> Result<(), ModelClientError> {
            if self.available {
                Ok(())
            } else {
                Err(ModelClientError::ModelUnavailable("missing".into()))
            }
        }

        async fn generate_stream(
            &self,
            _model: &str,
            _prompt: &str,
            _options: GenerateOptions,
        ) -> Result<Pin<Box<dyn futures::Stream<Item = GenerateChunk> + Send>>, ModelClientError> {
            let chunk = GenerateChunk {
                response: self.content.clone(),
                done: true,
                eval_count: Some(1),
                prompt_eval_count: Some(1),
            };
            Ok(Box::pin(futures::stream::iter(vec![chunk])))
        }
    }

    #[tokio::test]
    async fn unavailable_model_yields_failed_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let client = StaticModel { content: String::new(), available: false };
        let result = run_candidate(&client, "m1", "prompt", "java", dir.path(), Duration::from_secs(5)).await;
        assert!(!result.success);
        assert_eq!(result.tool, "ensure-failed");
    }

    #[tokio::test]
    async fn non_java_candidate_with_no_files_fails_compile() {
        let dir = tempfile::tempdir().unwrap();
        let client = StaticModel { content: "just prose, no file markers".to_string(), available: true };
        let result = run_candidate(&client, "m1", "prompt", "python", dir.path(), Duration::from_secs(5)).await;
        assert!(!result.compile_pass);
        assert!(!result.test_pass);
    }

    #[tokio::test]
    async fn extracted_files_are_written_under_sandbox_root() {
        let dir = tempfile::tempdir().unwrap();
        let content = "File: src/Foo.py\n```python\nprint('hi')\n```\n".to_string();
        let client = StaticModel { content, available: true };
        let result = run_candidate(&client, "m1", "prompt", "python", dir.path(), Duration::from_secs(5)).await;
        assert!(result.compile_pass);
        assert!(result.files.contains_key("src/Foo.py"));
        let root = result.sandbox_root.expect("sandbox root set");
        assert!(tokio::fs::metadata(Path::new(&root).join("src/Foo.py")).await.is_ok());
    }
}
