//! # SSE Parser
//!
//! Turns a chunked byte stream into Server-Sent Events:
//! - Line buffering across chunk boundaries (`\n` or `\r\n`)
//! - `data:` lines accumulate until a blank line dispatches the event
//! - Comment lines (`:`) surface as [`SseEvent::Comment`] so callers can see
//!   heartbeats
//! - `event:`, `id:`, and `retry:` fields are ignored
//!
//! An event left incomplete when the stream ends is discarded. A line longer
//! than [`MAX_LINE_BYTES`] ends the stream.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::warn;

/// Longest line the parser buffers while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// One parsed SSE item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// Dispatched `data` payload (multiple data lines joined with `\n`).
    Data(String),
    /// Comment line text after the colon, leading space trimmed.
    Comment(String),
}

enum Line<'a> {
    Blank,
    Comment(&'a str),
    Data(&'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(text) = line.strip_prefix(':') {
        return Line::Comment(text.strip_prefix(' ').unwrap_or(text));
    }
    let (field, value) = line.split_once(':').unwrap_or((line, ""));
    if field == "data" {
        Line::Data(value.strip_prefix(' ').unwrap_or(value))
    } else {
        Line::Other
    }
}

/// Parse SSE events from a byte stream.
///
/// The returned stream ends when the input ends, yields an error, or sends a
/// line over [`MAX_LINE_BYTES`]; the cause is logged, not returned.
pub fn parse_sse<S, E>(byte_stream: S) -> impl Stream<Item = SseEvent> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    futures::stream::unfold(
        (
            Box::pin(byte_stream),
            BytesMut::with_capacity(4096),
            Vec::<String>::new(),
        ),
        |(mut stream, mut buffer, mut data)| async move {
            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(newline_pos);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }
                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue;
                    };

                    match classify(line) {
                        Line::Blank if !data.is_empty() => {
                            let payload = data.join("\n");
                            data.clear();
                            return Some((SseEvent::Data(payload), (stream, buffer, data)));
                        }
                        Line::Comment(text) => {
                            let event = SseEvent::Comment(text.to_string());
                            return Some((event, (stream, buffer, data)));
                        }
                        Line::Data(value) => data.push(value.to_string()),
                        Line::Blank | Line::Other => {}
                    }
                    continue;
                }

                if buffer.len() > MAX_LINE_BYTES {
                    warn!(buffered = buffer.len(), "SSE line exceeds {MAX_LINE_BYTES} bytes, closing stream");
                    return None;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
