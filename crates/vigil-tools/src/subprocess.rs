//! Helper subprocess launcher.
//!
//! Tools that shell out (`rg`, `fd`, `find`, `git`) go through one launcher
//! that enforces the cross-cutting controls: a minimal synthesized
//! environment (nothing inherited), the working directory pinned inside the
//! sandbox, kill-on-drop, and cooperative cancellation from the executor's
//! per-call context.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ToolError;
use crate::traits::ToolContext;

/// Minimal PATH handed to helpers.
const HELPER_PATH: &str = "/usr/bin:/usr/local/bin:/bin";

/// Captured output of one helper run.
#[derive(Debug)]
pub struct HelperOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Exit code, when the process exited on its own.
    pub exit_code: Option<i32>,
    /// The per-call deadline fired before the helper finished.
    pub timed_out: bool,
    /// The call was cancelled before the helper finished.
    pub interrupted: bool,
}

impl HelperOutput {
    fn terminated(timed_out: bool) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out,
            interrupted: !timed_out,
        }
    }
}

/// Run a helper binary with a synthesized environment.
///
/// `extra_env` entries are added on top of the minimal `PATH`/`HOME`. The
/// child is killed when the context's cancellation fires, when the context
/// timeout elapses, or when the returned future is dropped.
pub async fn run_helper(
    program: &str,
    args: &[String],
    cwd: &Path,
    extra_env: &[(String, String)],
    ctx: &ToolContext,
) -> Result<HelperOutput, ToolError> {
    let mut cmd = Command::new(program);
    let _ = cmd
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .env("PATH", HELPER_PATH)
        .env("HOME", "/tmp")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in extra_env {
        let _ = cmd.env(key, value);
    }

    debug!(program, ?args, cwd = %cwd.display(), "spawning helper");

    let child = cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::HelperMissing {
                name: program.to_owned(),
                hint: format!("Install {program} to use this tool."),
            }
        } else {
            ToolError::Spawn {
                program: program.to_owned(),
                source,
            }
        }
    })?;

    let output = tokio::select! {
        biased;
        () = ctx.cancellation.cancelled() => {
            debug!(program, "helper cancelled");
            return Ok(HelperOutput::terminated(false));
        }
        () = tokio::time::sleep(ctx.timeout) => {
            warn!(program, timeout_ms = ctx.timeout.as_millis() as u64, "helper timed out");
            return Ok(HelperOutput::terminated(true));
        }
        result = child.wait_with_output() => {
            result.map_err(|source| ToolError::Spawn {
                program: program.to_owned(),
                source,
            })?
        }
    };

    Ok(HelperOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
        timed_out: false,
        interrupted: false,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ctx() -> ToolContext {
        ToolContext::new(Duration::from_secs(10))
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let out = run_helper("echo", &args(&["hello"]), tmp.path(), &[], &ctx())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(0));
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn environment_is_synthesized() {
        let tmp = tempfile::tempdir().unwrap();
        std::env::set_var("VIGIL_LEAK_CHECK", "leaked");
        let out = run_helper("env", &args(&[]), tmp.path(), &[], &ctx())
            .await
            .unwrap();
        assert!(!out.stdout.contains("VIGIL_LEAK_CHECK"));
        assert!(out.stdout.contains("HOME=/tmp"));
        std::env::remove_var("VIGIL_LEAK_CHECK");
    }

    #[tokio::test]
    async fn extra_env_is_passed() {
        let tmp = tempfile::tempdir().unwrap();
        let extra = vec![("GIT_CEILING_DIRECTORIES".to_owned(), "/repo".to_owned())];
        let out = run_helper("env", &args(&[]), tmp.path(), &extra, &ctx())
            .await
            .unwrap();
        assert!(out.stdout.contains("GIT_CEILING_DIRECTORIES=/repo"));
    }

    #[tokio::test]
    async fn missing_binary_reports_helper_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run_helper("vigil-no-such-binary", &args(&[]), tmp.path(), &[], &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::HelperMissing { .. }));
    }

    #[tokio::test]
    async fn timeout_kills_helper() {
        let tmp = tempfile::tempdir().unwrap();
        let short = ToolContext::new(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let out = run_helper("sleep", &args(&["10"]), tmp.path(), &[], &short)
            .await
            .unwrap();
        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_kills_helper() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx();
        let cancel = ctx.cancellation.clone();
        let path = tmp.path().to_path_buf();

        let handle = tokio::spawn(async move {
            run_helper("sleep", &args(&["10"]), &path, &[], &ctx).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let out = handle.await.unwrap().unwrap();
        assert!(out.interrupted);
    }
}
