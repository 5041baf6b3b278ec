//! Line parser for the chunked streaming fallback.
//!
//! When an intent carries custom headers the native event-source path is
//! unavailable, so the response body is read as a raw chunked byte stream
//! and split into frame payloads here. The endpoint may emit either
//! `data: `-prefixed event lines or bare newline-delimited JSON; both
//! yield the same payload strings.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use kennel_protocol::ContextFrame;

/// Split a chunked byte stream into frame payload strings.
///
/// Buffers incoming bytes, splits on newlines, and extracts one payload
/// per frame line. A trailing line without a final newline is still
/// processed when the stream ends. Read errors end the stream after a
/// warning; reconnect policy lives with the caller.
pub(crate) fn frame_payloads<S>(byte_stream: S) -> impl Stream<Item = String> + Send
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
                // Drain complete lines already buffered (zero-copy split)
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let line = match std::str::from_utf8(&line_bytes) {
                        Ok(s) => s,
                        Err(_) => continue, // skip invalid UTF-8 lines
                    };

                    if let Some(payload) = extract_frame_payload(line) {
                        return Some((payload, (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "chunked stream read error");
                        return None;
                    }
                    None => {
                        // Stream ended — a trailing partial line still counts
                        if !buffer.is_empty() {
                            let line = match std::str::from_utf8(&buffer) {
                                Ok(s) => s.trim(),
                                Err(_) => return None,
                            };
                            if let Some(payload) = extract_frame_payload(line) {
                                buffer.clear();
                                return Some((payload, (stream, buffer, true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the frame payload from one line.
///
/// Accepts `data: `-prefixed event lines and bare JSON lines. Returns
/// `None` for blank lines, comments, and event-source fields that carry
/// no payload (`event:`, `id:`, `retry:`).
fn extract_frame_payload(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    if let Some(data) = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))
    {
        let data = data.trim();
        if data.is_empty() {
            return None;
        }
        return Some(data.to_owned());
    }

    // Bare newline-delimited JSON
    if trimmed.starts_with('{') {
        return Some(trimmed.to_owned());
    }

    None
}

/// Parse a payload string into a context frame.
///
/// Returns `None` on parse failure with a warning; a malformed frame
/// never tears down the stream.
pub(crate) fn parse_frame(payload: &str) -> Option<ContextFrame> {
    match serde_json::from_str(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, len = payload.len(), "skipping unparseable stream frame");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── extract_frame_payload ────────────────────────────────────────────

    #[test]
    fn extract_prefixed_line() {
        assert_eq!(
            extract_frame_payload("data: {\"type\":\"info\"}"),
            Some("{\"type\":\"info\"}".into())
        );
    }

    #[test]
    fn extract_prefixed_line_no_space() {
        assert_eq!(
            extract_frame_payload("data:{\"type\":\"info\"}"),
            Some("{\"type\":\"info\"}".into())
        );
    }

    #[test]
    fn extract_bare_json_line() {
        assert_eq!(
            extract_frame_payload("{\"type\":\"complete\"}"),
            Some("{\"type\":\"complete\"}".into())
        );
    }

    #[test]
    fn extract_skips_empty_and_comment() {
        assert_eq!(extract_frame_payload(""), None);
        assert_eq!(extract_frame_payload("   "), None);
        assert_eq!(extract_frame_payload(": keepalive"), None);
    }

    #[test]
    fn extract_skips_empty_data() {
        assert_eq!(extract_frame_payload("data: "), None);
        assert_eq!(extract_frame_payload("data:"), None);
    }

    #[test]
    fn extract_skips_non_data_fields() {
        assert_eq!(extract_frame_payload("event: context"), None);
        assert_eq!(extract_frame_payload("id: 7"), None);
        assert_eq!(extract_frame_payload("retry: 3000"), None);
    }

    // ── parse_frame ──────────────────────────────────────────────────────

    #[test]
    fn parse_valid_frame() {
        let frame = parse_frame("{\"type\":\"info\",\"message\":\"warming up\"}").unwrap();
        assert!(matches!(frame, ContextFrame::Info { .. }));
    }

    #[test]
    fn parse_invalid_frame_returns_none() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame("{\"type\":\"mystery\"}").is_none());
    }

    // ── frame_payloads (integration) ─────────────────────────────────────

    fn chunked(parts: Vec<&str>) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin {
        futures::stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from(p.to_owned())))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn single_chunk_single_frame() {
        let stream = chunked(vec!["data: {\"type\":\"info\"}\n\n"]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"type\":\"info\"}"]);
    }

    #[tokio::test]
    async fn multiple_frames_in_one_chunk() {
        let stream = chunked(vec!["{\"a\":1}\n{\"b\":2}\n"]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        let stream = chunked(vec!["data: {\"contextNa", "me\":\"services\"}\n\n"]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"contextName\":\"services\"}"]);
    }

    #[tokio::test]
    async fn mixed_prefixed_and_bare_lines() {
        let stream = chunked(vec![
            ": keepalive\n",
            "data: {\"type\":\"info\"}\n\n",
            "{\"type\":\"complete\"}\n",
        ]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"type\":\"info\"}", "{\"type\":\"complete\"}"]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_still_yields() {
        let stream = chunked(vec!["{\"type\":\"complete\"}"]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"type\":\"complete\"}"]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let stream = chunked(vec![]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert!(payloads.is_empty());
    }

    #[tokio::test]
    async fn carriage_returns_are_trimmed() {
        let stream = chunked(vec!["data: {\"cr\":true}\r\n\r\n"]);
        let payloads: Vec<String> = frame_payloads(stream).collect().await;
        assert_eq!(payloads, vec!["{\"cr\":true}"]);
    }
}
