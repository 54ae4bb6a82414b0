//! `directory_tree` — tree-style listing of the sandboxed tree.
//!
//! Implemented in pure Rust: no `tree` binary required, and no subprocess to
//! police. Symlinks are marked but never descended; dependency caches, VCS
//! internals, and build output are filtered out as noise.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use vigil_core::{ParamDef, ToolResult, ToolSchema};

use crate::sandbox::Sandbox;
use crate::traits::{SandboxTool, ToolContext};

/// Depth ceiling; deeper trees waste the model's context.
const MAX_TREE_DEPTH: i64 = 6;
/// Default depth.
const DEFAULT_TREE_DEPTH: i64 = 3;
/// Total entries cap across the whole render.
const MAX_TREE_ENTRIES: usize = 500;

/// Directories that are noise in a security-analysis context.
const SKIP_ENTRIES: &[&str] = &[
    "node_modules",
    ".git",
    "vendor",
    "__pycache__",
    ".idea",
    ".vscode",
    ".DS_Store",
    "dist",
    "build",
    "target",
    ".next",
    ".nuxt",
    ".cache",
];

/// Render a directory tree.
pub struct DirectoryTreeTool {
    sandbox: Arc<Sandbox>,
}

impl DirectoryTreeTool {
    /// Create the tool over a session sandbox.
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }

    fn build_tree(
        dir: &Path,
        prefix: &str,
        remaining_depth: i64,
        entry_count: &mut usize,
        out: &mut String,
    ) {
        if remaining_depth <= 0 || *entry_count >= MAX_TREE_ENTRIES {
            return;
        }

        let mut entries: Vec<std::fs::DirEntry> = match std::fs::read_dir(dir) {
            Ok(iter) => iter.filter_map(Result::ok).collect(),
            Err(_) => {
                out.push_str(prefix);
                out.push_str("└── [error reading directory]\n");
                return;
            }
        };

        entries.retain(|e| !should_skip(&e.file_name().to_string_lossy()));

        // Directories first, then files, both lexical — a stable layout the
        // model can rely on.
        entries.sort_by_key(|e| {
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (!is_dir, e.file_name())
        });

        let last_index = entries.len().saturating_sub(1);
        for (i, entry) in entries.iter().enumerate() {
            *entry_count += 1;
            if *entry_count >= MAX_TREE_ENTRIES {
                return;
            }

            let is_last = i == last_index;
            let connector = if is_last { "└── " } else { "├── " };
            let child_prefix = if is_last { "    " } else { "│   " };
            let name = entry.file_name().to_string_lossy().into_owned();

            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            // Symlinks are marked, never followed.
            if file_type.is_symlink() {
                let target = std::fs::read_link(entry.path())
                    .map_or_else(|_| "[unreadable symlink]".to_owned(), |t| t.display().to_string());
                out.push_str(prefix);
                out.push_str(connector);
                out.push_str(&format!("{name} -> {target} [symlink, not followed]\n"));
                continue;
            }

            if file_type.is_dir() {
                out.push_str(prefix);
                out.push_str(connector);
                out.push_str(&name);
                out.push_str("/\n");
                Self::build_tree(
                    &entry.path(),
                    &format!("{prefix}{child_prefix}"),
                    remaining_depth - 1,
                    entry_count,
                    out,
                );
            } else {
                out.push_str(prefix);
                out.push_str(connector);
                out.push_str(&name);
                out.push('\n');
            }
        }
    }
}

fn should_skip(name: &str) -> bool {
    SKIP_ENTRIES.contains(&name)
}

#[async_trait]
impl SandboxTool for DirectoryTreeTool {
    fn name(&self) -> &str {
        "directory_tree"
    }

    fn description(&self) -> &str {
        "Show the directory structure as a tree. Useful for understanding \
         project layout, finding important directories (src, lib, config, \
         test, etc.), and planning investigation strategy."
    }

    fn schema(&self) -> ToolSchema {
        let mut parameters = BTreeMap::new();
        let _ = parameters.insert(
            "path".to_owned(),
            ParamDef::string("Directory to show (relative to repo root)"),
        );
        let _ = parameters.insert(
            "depth".to_owned(),
            ParamDef::integer("Maximum depth to traverse (default: 3, max: 6)"),
        );
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters,
            required: vec![],
        }
    }

    async fn execute(&self, params: &Map<String, Value>, _ctx: &ToolContext) -> ToolResult {
        let dir_path = match crate::params::optional_str(params, "path") {
            Ok(p) => p,
            Err(e) => return e,
        };
        let mut depth = match crate::params::optional_int(params, "depth", DEFAULT_TREE_DEPTH) {
            Ok(d) => d,
            Err(e) => return e,
        };
        if depth > MAX_TREE_DEPTH {
            depth = MAX_TREE_DEPTH;
        }
        if depth < 1 {
            depth = DEFAULT_TREE_DEPTH;
        }

        let target = match &dir_path {
            Some(p) => match self.sandbox.validate_path(p) {
                Ok(v) => v,
                Err(e) => return ToolResult::error(format!("Path validation failed: {e}")),
            },
            None => self.sandbox.root().to_path_buf(),
        };

        match std::fs::metadata(&target) {
            Ok(meta) if !meta.is_dir() => {
                return ToolResult::error(format!(
                    "{:?} is not a directory",
                    dir_path.unwrap_or_default()
                ));
            }
            Err(e) => return ToolResult::error(format!("Cannot access path: {e}")),
            Ok(_) => {}
        }

        let display_root = target
            .strip_prefix(self.sandbox.root())
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| ".".to_owned(), |p| p.display().to_string());

        let mut out = format!("{display_root}/\n");
        let mut entry_count = 0usize;
        Self::build_tree(&target, "", depth, &mut entry_count, &mut out);

        let truncated = entry_count >= MAX_TREE_ENTRIES;
        if truncated {
            out.push_str(&format!(
                "\n... truncated (showing {MAX_TREE_ENTRIES} entries, use a narrower path or smaller depth)\n"
            ));
        }

        ToolResult::ok(out)
            .with_meta("depth", json!(depth))
            .with_meta("entry_count", json!(entry_count))
            .with_meta("truncated", json!(truncated))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
