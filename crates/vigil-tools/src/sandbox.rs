//! Filesystem sandbox — the single gatekeeper for every tool's disk access.
//!
//! Security model:
//! - all paths are resolved to absolute form before comparison
//! - symlinks are fully evaluated to defeat symlink-escape attacks
//! - the root itself is resolved once, at construction, and never changes
//!
//! Threats considered: `../` traversal, symlink escape (a link inside the
//! repository pointing at `/etc/passwd`), and sibling-prefix confusion
//! (`/repo` must not admit `/repo-evil`).

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Sandbox construction and validation errors.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The root could not be made absolute.
    #[error("sandbox: failed to resolve absolute path {path:?}: {source}")]
    RootAbsolute {
        /// The requested root.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Symlink evaluation of the root failed (typically: does not exist).
    #[error("sandbox: failed to resolve symlinks for {path:?}: {source}")]
    RootResolve {
        /// The absolutized root.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The resolved root is not a directory.
    #[error("sandbox: root path {path:?} is not a directory")]
    RootNotDirectory {
        /// The resolved root.
        path: PathBuf,
    },

    /// A requested path resolves outside the sandbox root.
    #[error("sandbox: path {requested:?} resolves to {resolved:?} which is outside sandbox root {root:?}")]
    Escape {
        /// The path as requested.
        requested: String,
        /// Where it actually resolved.
        resolved: PathBuf,
        /// The sandbox root.
        root: PathBuf,
    },

    /// The terminal element does not exist and its parent cannot be resolved.
    #[error("sandbox: path {requested:?} does not exist and parent cannot be resolved: {source}")]
    UnresolvableParent {
        /// The path as requested.
        requested: String,
        /// Underlying error.
        source: io::Error,
    },
}

/// Decides whether a requested path lies beneath the resolved root.
///
/// Immutable after construction; freely shared across a session's tools.
#[derive(Debug)]
pub struct Sandbox {
    /// Absolute, symlink-evaluated boundary. Computed once, never changed.
    resolved_root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`.
    ///
    /// The root is absolutized, symlink-evaluated, and must be an existing
    /// directory. Resolving the root up front prevents a target whose root
    /// is itself a symlink to `/` from widening the boundary.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref();

        let abs = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| SandboxError::RootAbsolute {
                    path: root.to_path_buf(),
                    source,
                })?
                .join(root)
        };

        let resolved = std::fs::canonicalize(&abs).map_err(|source| SandboxError::RootResolve {
            path: abs.clone(),
            source,
        })?;

        if !resolved.is_dir() {
            return Err(SandboxError::RootNotDirectory { path: resolved });
        }

        Ok(Self {
            resolved_root: resolved,
        })
    }

    /// The resolved sandbox root. Tools pass this as the working directory
    /// for helper subprocesses.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.resolved_root
    }

    /// Validate a requested path, returning its canonical form.
    ///
    /// Every tool MUST call this before any file or directory access:
    /// 1. relative paths are joined to the root; the result is lexically
    ///    cleaned
    /// 2. symlinks are fully evaluated — without this, a link at
    ///    `repo/link -> /etc/shadow` would pass a prefix check
    /// 3. if the terminal element does not exist, the parent directory is
    ///    resolved instead and must itself lie inside the root (tools may
    ///    name paths produced by external helpers)
    /// 4. the resolved path must equal the root or live strictly beneath it
    pub fn validate_path(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        let requested_path = Path::new(requested);
        let abs = if requested_path.is_absolute() {
            clean_path(requested_path)
        } else {
            clean_path(&self.resolved_root.join(requested_path))
        };

        match std::fs::canonicalize(&abs) {
            Ok(resolved) => {
                if self.is_within_root(&resolved) {
                    Ok(resolved)
                } else {
                    Err(SandboxError::Escape {
                        requested: requested.to_owned(),
                        resolved,
                        root: self.resolved_root.clone(),
                    })
                }
            }
            Err(err) => {
                // Terminal element missing: accept only if the parent
                // directory resolves strictly inside the root.
                let Some(parent) = abs.parent() else {
                    return Err(SandboxError::UnresolvableParent {
                        requested: requested.to_owned(),
                        source: err,
                    });
                };
                let resolved_parent = std::fs::canonicalize(parent).map_err(|source| {
                    SandboxError::UnresolvableParent {
                        requested: requested.to_owned(),
                        source,
                    }
                })?;
                if !self.is_within_root(&resolved_parent) {
                    return Err(SandboxError::Escape {
                        requested: requested.to_owned(),
                        resolved: resolved_parent,
                        root: self.resolved_root.clone(),
                    });
                }
                // Parent is inside; the file just doesn't exist yet.
                Ok(abs)
            }
        }
    }

    /// Containment check for a path returned by an external helper.
    ///
    /// Helpers are invoked with symlink following disabled, so their output
    /// is already resolved — this re-checks the prefix without resolving
    /// again, as defense in depth.
    pub fn validate_output_path(&self, output: &str) -> Result<PathBuf, SandboxError> {
        let output_path = Path::new(output);
        let abs = if output_path.is_absolute() {
            clean_path(output_path)
        } else {
            clean_path(&self.resolved_root.join(output_path))
        };
        if self.is_within_root(&abs) {
            Ok(abs)
        } else {
            Err(SandboxError::Escape {
                requested: output.to_owned(),
                resolved: abs,
                root: self.resolved_root.clone(),
            })
        }
    }

    /// Component-wise containment: the root itself is always valid, and
    /// `/repo` never admits `/repo-evil` (comparison is per path component,
    /// not per byte).
    fn is_within_root(&self, resolved: &Path) -> bool {
        resolved == self.resolved_root || resolved.starts_with(&self.resolved_root)
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Operates purely on the path text; symlink evaluation
/// happens separately in [`Sandbox::validate_path`].
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping at the root is a no-op: "/.." cleans to "/".
                let _ = out.pop();
            }
            Component::Normal(c) => out.push(c),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sandbox_in(dir: &Path) -> Sandbox {
        Sandbox::new(dir).expect("sandbox over tempdir")
    }

    #[test]
    fn new_rejects_missing_root() {
        let err = Sandbox::new("/definitely/not/a/real/path/hopefully").unwrap_err();
        assert!(matches!(err, SandboxError::RootResolve { .. }));
    }

    #[test]
    fn new_rejects_file_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let err = Sandbox::new(&file).unwrap_err();
        assert!(matches!(err, SandboxError::RootNotDirectory { .. }));
    }

    #[test]
    fn root_is_always_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());
        let resolved = sb.validate_path(".").unwrap();
        assert_eq!(resolved, sb.root());
    }

    #[test]
    fn relative_path_inside_root_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/main.rs"), "fn main() {}").unwrap();
        let sb = sandbox_in(tmp.path());
        let resolved = sb.validate_path("src/main.rs").unwrap();
        assert!(resolved.starts_with(sb.root()));
        assert!(resolved.ends_with("src/main.rs"));
    }

    #[test]
    fn dotdot_traversal_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());
        // Any number of leading "../" must fail.
        for escape in ["../", "../../", "../../../../../.."] {
            let requested = format!("{escape}etc/passwd");
            let err = sb.validate_path(&requested);
            assert!(err.is_err(), "expected rejection for {requested}");
        }
    }

    #[test]
    fn absolute_path_outside_root_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());
        let err = sb.validate_path("/etc/passwd").unwrap_err();
        assert!(matches!(err, SandboxError::Escape { .. }));
    }

    #[test]
    fn absolute_path_inside_root_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("notes.md"), "notes").unwrap();
        let sb = sandbox_in(tmp.path());
        let inside = sb.root().join("notes.md");
        let resolved = sb.validate_path(inside.to_str().unwrap()).unwrap();
        assert!(resolved.ends_with("notes.md"));
    }

    #[test]
    fn prefix_sibling_rejected() {
        // Root /tmp/xyz/repo must not admit /tmp/xyz/repo-evil.
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        let evil = tmp.path().join("repo-evil");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&evil).unwrap();
        fs::write(evil.join("secrets.txt"), "hunter2").unwrap();

        let sb = sandbox_in(&root);
        let err = sb
            .validate_path(evil.join("secrets.txt").to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, SandboxError::Escape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        let outside = tmp.path().join("outside");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("shadow"), "secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("evil")).unwrap();

        let sb = sandbox_in(&root);
        let err = sb.validate_path("evil/shadow").unwrap_err();
        assert!(matches!(err, SandboxError::Escape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_within_root_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/file.txt"), "ok").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let sb = sandbox_in(&root);
        let resolved = sb.validate_path("alias/file.txt").unwrap();
        assert!(resolved.starts_with(sb.root()));
        assert!(resolved.ends_with("real/file.txt"));
    }

    #[test]
    fn nonexistent_file_under_root_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());
        let resolved = sb.validate_path("does-not-exist-yet.txt").unwrap();
        assert!(resolved.starts_with(sb.root()));
    }

    #[test]
    fn nonexistent_file_under_bad_parent_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());
        assert!(sb.validate_path("../elsewhere/new.txt").is_err());
        assert!(sb.validate_path("no-such-dir/deeper/new.txt").is_err());
    }

    #[test]
    fn validate_output_path_checks_prefix_only() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox_in(tmp.path());

        let ok = sb.validate_output_path("src/lib.rs").unwrap();
        assert!(ok.starts_with(sb.root()));

        assert!(sb.validate_output_path("/etc/passwd").is_err());
        assert!(sb.validate_output_path("../sibling/x").is_err());
    }

    #[test]
    fn clean_path_folds_components() {
        assert_eq!(clean_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(clean_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("/a//b/")), PathBuf::from("/a/b"));
    }
}
