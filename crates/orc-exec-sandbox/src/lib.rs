//! Run one allow-listed build/test tool with a timeout, a minimal
//! `PATH`, no stdin, and captured output.
//!
//! The allow-list and `PATH` value are exactly the Python predecessor's
//! `exec_sandbox.py::ALLOWLIST`/`SAFE_PATH`.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

pub const ALLOWLIST: &[&str] = &[
    "javac", "mvn", "gradlew", "./gradlew", "pytest", "ruff", "black", "node", "npm", "pnpm",
    "npx",
];

pub const SAFE_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Timeout kill exit code, matching the Python predecessor.
pub const TIMEOUT_RETURN_CODE: i32 = 124;
/// Disallowed-command exit code.
pub const DISALLOWED_RETURN_CODE: i32 = 1;
/// Command-not-found exit code (mirrors POSIX shell convention).
pub const NOT_FOUND_RETURN_CODE: i32 = 127;

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    fn synthetic(return_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            return_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

fn is_allowed(tool: &str) -> bool {
    ALLOWLIST.contains(&tool)
}

/// Run `cmd` (`cmd[0]` is the tool, the rest its arguments) in `cwd`
/// under `timeout_dur`. Never returns an `Err` — every failure mode is
/// encoded as a synthetic [`ExecResult`], matching the worker's
/// typed-results-not-exceptions design.
pub async fn run_sandboxed(
    cmd: &[String],
    cwd: Option<&str>,
    timeout_dur: Duration,
) -> ExecResult {
    let Some(tool) = cmd.first() else {
        return ExecResult::synthetic(DISALLOWED_RETURN_CODE, "empty command");
    };

    if !is_allowed(tool) {
        tracing::warn!(tool, "rejected command outside exec-sandbox allow-list");
        return ExecResult::synthetic(
            DISALLOWED_RETURN_CODE,
            format!("tool '{tool}' not allowed"),
        );
    }

    let mut command = Command::new(tool);
    command
        .args(&cmd[1..])
        .env_clear()
        .env("PATH", SAFE_PATH)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let spawned = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ExecResult::synthetic(NOT_FOUND_RETURN_CODE, e.to_string());
        }
        Err(e) => return ExecResult::synthetic(NOT_FOUND_RETURN_CODE, e.to_string()),
    };

    match timeout(timeout_dur, run_to_completion(spawned)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(tool, timeout_secs = timeout_dur.as_secs(), "exec sandbox timed out");
            ExecResult::synthetic(TIMEOUT_RETURN_CODE, "timeout")
        }
    }
}

async fn run_to_completion(mut child: tokio::process::Child) -> ExecResult {
    // stdout and stderr must drain concurrently, not one after the other:
    // a child that fills one pipe's buffer before closing the other would
    // otherwise deadlock this function against the child's own blocked
    // write, masking a passing build as a timeout.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_fut = async {
        let mut buf = String::new();
        if let Some(out) = stdout_pipe.as_mut() {
            let _ = out.read_to_string(&mut buf).await;
        }
        buf
    };
    let stderr_fut = async {
        let mut buf = String::new();
        if let Some(err) = stderr_pipe.as_mut() {
            let _ = err.read_to_string(&mut buf).await;
        }
        buf
    };
    let (stdout_buf, stderr_buf) = tokio::join!(stdout_fut, stderr_fut);
    let status = child.wait().await;
    let return_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
    ExecResult {
        return_code,
        stdout: stdout_buf,
        stderr: stderr_buf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disallowed_command_is_rejected() {
        let res = run_sandboxed(
            &["rm".to_string(), "-rf".to_string(), "/".to_string()],
            None,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(res.return_code, DISALLOWED_RETURN_CODE);
        assert!(res.stderr.contains("not allowed"));
    }

    #[tokio::test]
    async fn allowed_command_runs() {
        let res = run_sandboxed(
            &["node".to_string(), "--version".to_string()],
            None,
            Duration::from_secs(10),
        )
        .await;
        // node may not be installed in every CI image; either it ran
        // (code 0) or it wasn't found (127) — both are legitimate
        // synthetic outcomes, never a panic.
        assert!(res.return_code == 0 || res.return_code == NOT_FOUND_RETURN_CODE);
    }

    #[tokio::test]
    async fn timeout_kills_and_returns_124() {
        // `pytest` with no args on a missing project will return fast
        // in most environments; exercise the timeout path directly via
        // a tool that's allow-listed but will not exist, forcing the
        // NotFound branch instead is unreliable across environments, so
        // this test only asserts the synthetic-result shape is used.
        let res = run_sandboxed(
            &["npx".to_string(), "--version".to_string()],
            None,
            Duration::from_nanos(1),
        )
        .await;
        assert!(res.return_code == TIMEOUT_RETURN_CODE || res.return_code == NOT_FOUND_RETURN_CODE);
    }

    #[test]
    fn allowlist_matches_spec() {
        for tool in [
            "javac", "mvn", "gradlew", "./gradlew", "pytest", "ruff", "black", "node", "npm",
            "pnpm", "npx",
        ] {
            assert!(is_allowed(tool));
        }
        assert!(!is_allowed("rm"));
        assert!(!is_allowed("curl"));
    }
}
