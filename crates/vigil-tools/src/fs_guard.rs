//! Bounded file-read policy.
//!
//! Tools that read source files share one gate: a size ceiling (protecting
//! the context window and memory), a regular-file requirement (no devices,
//! no FIFOs), and a NUL-byte sniff over the first 512 bytes as the binary
//! heuristic.

use std::path::Path;

use tokio::io::AsyncReadExt;
use vigil_core::ToolResult;

/// Hard ceiling on file size for read tools.
pub const MAX_READ_BYTES: u64 = 500 * 1024;

/// Bytes sniffed for the binary heuristic.
const BINARY_SNIFF_BYTES: usize = 512;

/// Verify a path is a readable text file within policy.
///
/// Returns an error [`ToolResult`] (ready to hand to the model) when the
/// path is a directory, not a regular file, larger than 500 KiB, or looks
/// binary. `display` is the path as the model referred to it.
pub async fn check_text_file(path: &Path, display: &str) -> Result<(), ToolResult> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) => return Err(ToolResult::error(format!("Cannot access file: {e}"))),
    };

    if meta.is_dir() {
        return Err(ToolResult::error(format!(
            "{display:?} is a directory, not a file. Use directory_tree instead."
        )));
    }
    if !meta.is_file() {
        return Err(ToolResult::error(format!(
            "{display:?} is not a regular file"
        )));
    }
    if meta.len() > MAX_READ_BYTES {
        return Err(ToolResult::error(format!(
            "File is too large to read (exceeds {} KiB limit).",
            MAX_READ_BYTES / 1024
        )));
    }

    // Binary heuristic: a NUL in the first 512 bytes.
    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => return Err(ToolResult::error(format!("Cannot open file: {e}"))),
    };
    let mut head = [0u8; BINARY_SNIFF_BYTES];
    let n = match file.read(&mut head).await {
        Ok(n) => n,
        Err(e) => return Err(ToolResult::error(format!("Error reading file: {e}"))),
    };
    if head[..n].contains(&0) {
        return Err(ToolResult::error(format!(
            "{display:?} appears to be a binary file. Focus on source code."
        )));
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
