//! `git_log` — recent commit history for the sandboxed repository.
//!
//! Commit history pays off in security analysis: hastily-patched bugs,
//! messages referencing CVEs, and the file-stat blocks pointing at sensitive
//! areas. `GIT_CEILING_DIRECTORIES` is pinned to the sandbox root so git can
//! never ascend out of the sandbox and report on some other repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use vigil_core::{ParamDef, ToolResult, ToolSchema};

use crate::sandbox::Sandbox;
use crate::subprocess::run_helper;
use crate::traits::{SandboxTool, ToolContext};

/// Default commit count.
const DEFAULT_COUNT: i64 = 20;
/// Commit count ceiling.
const MAX_COUNT: i64 = 100;

/// Show recent commits with file stats.
pub struct GitLogTool {
    sandbox: Arc<Sandbox>,
}

impl GitLogTool {
    /// Create the tool over a session sandbox.
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl SandboxTool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show recent git commit history. Useful for understanding recent \
         changes, finding security-related commits, identifying active areas \
         of development, and spotting hasty fixes."
    }

    fn schema(&self) -> ToolSchema {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert(
            "path".to_owned(),
            ParamDef::string("Repository path or subdirectory to show history for"),
        );
        let _ = parameters.insert(
            "count".to_owned(),
            ParamDef::integer("Number of commits to show (default: 20, max: 100)"),
        );
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters,
            required: vec![],
        }
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let repo_path = match crate::params::optional_str(params, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let mut count = match crate::params::optional_int(params, "count", DEFAULT_COUNT) {
            Ok(c) => c,
            Err(e) => return e,
        };
        if count > MAX_COUNT {
            count = MAX_COUNT;
        }
        if count < 1 {
            count = DEFAULT_COUNT;
        }

        let target = match &repo_path {
            Some(p) => match self.sandbox.validate_path(p) {
                Ok(v) => v,
                Err(e) => return ToolResult::error(format!("Path validation failed: {e}")),
            },
            None => self.sandbox.root().to_path_buf(),
        };

        let args: Vec<String> = vec![
            "-C".into(),
            target.to_string_lossy().into_owned(),
            "log".into(),
            format!("-n{count}"),
            "--format=%h | %ad | %an | %s".into(),
            "--date=short".into(),
            "--stat".into(),
            "--stat-width=80".into(),
            "--no-walk".into(),
        ];
        // The ceiling stops git from ascending above the sandbox to discover
        // an unrelated enclosing repository.
        let extra_env = vec![(
            "GIT_CEILING_DIRECTORIES".to_owned(),
            self.sandbox.root().to_string_lossy().into_owned(),
        )];

        let output = match run_helper("git", &args, self.sandbox.root(), &extra_env, ctx).await {
            Ok(o) => o,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        if output.timed_out || output.interrupted {
            return ToolResult::error("git_log was cancelled before completing");
        }

        if output.exit_code != Some(0) {
            let stderr = output.stderr.trim();
            if stderr.contains("not a git repository") {
                return ToolResult::error("This directory is not a git repository.");
            }
            return ToolResult::error(format!(
                "git error (exit {:?}): {stderr}",
                output.exit_code
            ));
        }

        let trimmed = output.stdout.trim();
        if trimmed.is_empty() {
            return ToolResult::ok("No commits found (empty repository or no history).")
                .with_meta("commit_count", json!(0));
        }

        let root_prefix = format!("{}/", self.sandbox.root().display());
        let body = trimmed.replace(&root_prefix, "");
        let commit_count = body.lines().filter(|l| l.contains(" | ")).count();

        ToolResult::ok(body).with_meta("commit_count", json!(commit_count))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use std::time::Duration;

    fn ctx() -> ToolContext {
        ToolContext::new(Duration::from_secs(30))
    }

    fn have_git() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git_in(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "t@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "t@example.com")
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn non_repo_is_friendly_error() {
        if !have_git() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let tool = GitLogTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let r = tool.execute(&Map::new(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("not a git repository"));
    }

    #[tokio::test]
    async fn shows_commits_with_stats() {
        if !have_git() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        git_in(tmp.path(), &["init", "-q"]);
        fs::write(tmp.path().join("a.txt"), "one").unwrap();
        git_in(tmp.path(), &["add", "."]);
        git_in(tmp.path(), &["commit", "-q", "-m", "fix auth bypass"]);

        let tool = GitLogTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let r = tool.execute(&Map::new(), &ctx()).await;
        assert!(!r.is_error, "{}", r.content);
        assert!(r.content.contains("fix auth bypass"));
        assert!(r.content.contains("a.txt"));
        assert_eq!(r.metadata["commit_count"], 1);
    }

    #[tokio::test]
    async fn count_param_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = GitLogTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let params = json!({"count": "twenty"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("must be an integer"));
    }

    #[tokio::test]
    async fn path_outside_sandbox_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = GitLogTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let params = json!({"path": "/"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(r.is_error);
    }
}
