//! `code_search` — regex search over the sandboxed tree via ripgrep.
//!
//! Ripgrep is the right helper here: it respects `.gitignore`, is fast on
//! large repositories, and has built-in binary detection and file-size
//! limits. It is invoked with `--no-follow` so symlinks planted in a hostile
//! target cannot pull the search outside the sandbox.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;
use vigil_core::{ParamDef, ToolResult, ToolSchema};

use crate::sandbox::Sandbox;
use crate::subprocess::run_helper;
use crate::traits::{SandboxTool, ToolContext};

/// Default number of matching lines returned.
const DEFAULT_MAX_RESULTS: i64 = 50;
/// Hard ceiling on matching lines returned.
const MAX_RESULTS_CEILING: i64 = 200;
/// Matches contributed by any single file. Bounds one huge file's share of
/// the result; the total cap is applied afterwards.
const PER_FILE_MATCH_CAP: u32 = 10;

/// Regex search over a subtree.
pub struct CodeSearchTool {
    sandbox: Arc<Sandbox>,
}

impl CodeSearchTool {
    /// Create the tool over a session sandbox.
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl SandboxTool for CodeSearchTool {
    fn name(&self) -> &str {
        "code_search"
    }

    fn description(&self) -> &str {
        "Search for a regex pattern in source code files using ripgrep. \
         Returns matching lines with file paths and line numbers. Useful for \
         finding function definitions, API endpoints, auth patterns, \
         hardcoded secrets, and vulnerability indicators."
    }

    fn schema(&self) -> ToolSchema {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert(
            "pattern".to_owned(),
            ParamDef::string("Regex pattern to search for (ripgrep syntax)"),
        );
        let _ = parameters.insert(
            "path".to_owned(),
            ParamDef::string("Directory to search in (relative to repo root, or absolute within repo)"),
        );
        let _ = parameters.insert(
            "max_results".to_owned(),
            ParamDef::integer("Maximum number of matching lines to return (default: 50, max: 200)"),
        );
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters,
            required: vec!["pattern".into()],
        }
    }

    async fn execute(&self, params: &Map<String, Value>, ctx: &ToolContext) -> ToolResult {
        let pattern = match crate::params::required_str(params, "pattern") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let search_path = match crate::params::optional_str(params, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let mut max_results = match crate::params::optional_int(params, "max_results", DEFAULT_MAX_RESULTS) {
            Ok(n) => n,
            Err(e) => return e,
        };
        // A model asking for thousands of lines would only waste its own
        // context window.
        if max_results > MAX_RESULTS_CEILING {
            max_results = MAX_RESULTS_CEILING;
        }
        if max_results < 1 {
            max_results = DEFAULT_MAX_RESULTS;
        }

        let target = match &search_path {
            Some(p) => match self.sandbox.validate_path(p) {
                Ok(v) => v,
                Err(e) => return ToolResult::error(format!("Path validation failed: {e}")),
            },
            None => self.sandbox.root().to_path_buf(),
        };

        let args: Vec<String> = vec![
            "--no-follow".into(),
            "--color=never".into(),
            "-n".into(),
            "-i".into(),
            "--max-filesize".into(),
            "1M".into(),
            "--max-count".into(),
            PER_FILE_MATCH_CAP.to_string(),
            "--".into(),
            pattern.clone(),
            target.to_string_lossy().into_owned(),
        ];

        let output = match run_helper("rg", &args, self.sandbox.root(), &[], ctx).await {
            Ok(o) => o,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        if output.timed_out || output.interrupted {
            return ToolResult::error("code_search was cancelled before completing");
        }

        // rg exits 1 on no matches, 2 on errors (bad regex etc).
        match output.exit_code {
            Some(0) => {}
            Some(1) => {
                return ToolResult::ok("No matches found.")
                    .with_meta("match_count", json!(0))
                    .with_meta("pattern", json!(pattern));
            }
            _ => {
                return ToolResult::error(format!(
                    "ripgrep error (exit {:?}): {}",
                    output.exit_code,
                    output.stderr.trim()
                ));
            }
        }

        let trimmed = output.stdout.trim();
        let all_lines: Vec<&str> = trimmed.lines().collect();
        let total_matches = all_lines.len();
        #[allow(clippy::cast_sign_loss)]
        let shown = &all_lines[..total_matches.min(max_results as usize)];
        debug!(pattern, total_matches, shown = shown.len(), "code_search completed");

        // Root-relative paths: shorter for the model, and no host layout leak.
        let root_prefix = format!("{}/", self.sandbox.root().display());
        let body = shown.join("\n").replace(&root_prefix, "");

        ToolResult::ok(body)
            .with_meta("match_count", json!(total_matches))
            .with_meta("showing", json!(shown.len()))
            .with_meta("pattern", json!(pattern))
            .with_meta("capped", json!(total_matches > shown.len()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn fixture() -> (tempfile::TempDir, CodeSearchTool) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("auth.py"),
            "def login(user, pw):\n    query = \"SELECT * FROM users WHERE name='%s'\" % user\n",
        )
        .unwrap();
        fs::write(tmp.path().join("safe.py"), "print('hello')\n").unwrap();
        let sandbox = Arc::new(Sandbox::new(tmp.path()).unwrap());
        (tmp, CodeSearchTool::new(sandbox))
    }

    fn ctx() -> ToolContext {
        ToolContext::new(Duration::from_secs(30))
    }

    fn have_rg() -> bool {
        std::process::Command::new("rg")
            .arg("--version")
            .output()
            .is_ok()
    }

    #[test]
    fn schema_requires_pattern() {
        let (_tmp, tool) = fixture();
        let schema = tool.schema();
        assert_eq!(schema.name, "code_search");
        assert_eq!(schema.required, vec!["pattern"]);
        assert!(schema.parameters.contains_key("max_results"));
    }

    #[tokio::test]
    async fn missing_pattern_is_error_result() {
        let (_tmp, tool) = fixture();
        let r = tool.execute(&Map::new(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("pattern"));
    }

    #[tokio::test]
    async fn path_outside_sandbox_rejected() {
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "SELECT", "path": "/etc"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(r.is_error);
        assert!(r.content.contains("Path validation failed"));
    }

    #[tokio::test]
    async fn finds_matches_with_relative_paths() {
        if !have_rg() {
            return;
        }
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "SELECT \\* FROM"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error, "unexpected error: {}", r.content);
        assert!(r.content.contains("auth.py"));
        assert!(!r.content.contains(tool.sandbox.root().to_str().unwrap()));
    }

    #[tokio::test]
    async fn no_matches_is_friendly_non_error() {
        if !have_rg() {
            return;
        }
        let (_tmp, tool) = fixture();
        let params = json!({"pattern": "zzz_never_present_zzz"});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error);
        assert_eq!(r.content, "No matches found.");
        assert_eq!(r.metadata["match_count"], 0);
    }

    #[tokio::test]
    async fn max_results_caps_output() {
        if !have_rg() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        // 5 files x 1 matching line each (per-file cap untouched).
        for i in 0..5 {
            fs::write(tmp.path().join(format!("f{i}.txt")), "needle here\n").unwrap();
        }
        let tool = CodeSearchTool::new(Arc::new(Sandbox::new(tmp.path()).unwrap()));
        let params = json!({"pattern": "needle", "max_results": 2});
        let r = tool.execute(params.as_object().unwrap(), &ctx()).await;
        assert!(!r.is_error);
        assert_eq!(r.content.lines().count(), 2);
        assert_eq!(r.metadata["capped"], true);
        assert_eq!(r.metadata["match_count"], 5);
    }
}
