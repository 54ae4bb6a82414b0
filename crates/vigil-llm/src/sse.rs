//! # SSE Parser
//!
//! Shared Server-Sent Events parser for provider streams. Both supported
//! wire protocols stream over HTTP SSE; this module handles line buffering
//! across chunk boundaries, `data:` prefix extraction, comment/`[DONE]`
//! filtering, and trailing-buffer flush.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Parse SSE lines from a byte stream and yield the `data:` payload strings.
///
/// Implemented as an unfolded stream that:
/// 1. buffers incoming bytes
/// 2. splits on newlines (tolerating `\r\n`)
/// 3. extracts the `data: ` payload
/// 4. skips `[DONE]` markers, comments, and empty data
pub fn parse_sse_lines<S>(byte_stream: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        move |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                // Complete line available?
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue; // skip invalid UTF-8 lines
                    };

                    if let Some(data) = extract_sse_data(line) {
                        return Some((data, (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!("SSE stream read error: {e}");
                        return None;
                    }
                    None => {
                        // Stream ended — flush whatever remains.
                        if !buffer.is_empty() {
                            let data = std::str::from_utf8(&buffer)
                                .ok()
                                .and_then(|s| extract_sse_data(s.trim()));
                            if let Some(data) = data {
                                buffer.clear();
                                return Some((data, (stream, buffer, true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the data payload from one SSE line.
///
/// Returns `None` for comments, non-data fields, empty data, and `[DONE]`.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();

    if data == "[DONE]" || data.is_empty() {
        return None;
    }

    Some(data.to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
