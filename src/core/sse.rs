//! Server-sent events decoding shared by every wire format.
//!
//! [`SseDecoder`] is the sans-IO half: feed it raw body bytes as they arrive
//! and it hands back complete `data:` payloads, holding partial lines (and
//! split UTF-8 sequences) until the rest shows up. [`decode_stream`] drives
//! it from an HTTP body stream and applies a per-vendor extraction rule.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::{trace, warn};

use crate::core::error::ChatError;

/// What an extraction rule made of one `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A piece of assistant text.
    Text(String),
    /// Metadata, keep-alive, or something unparseable. Contributes nothing.
    Skip,
    /// The vendor's end-of-stream sentinel.
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    line.strip_prefix("data:").map(str::trim_start)
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns the payload of every complete `data:` line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        let mut start = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + offset;
            if let Some(payload) = Self::payload_from_line(&self.buffer[start..end]) {
                payloads.push(payload);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        payloads
    }

    /// Flushes a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::payload_from_line(&rest)
    }

    fn payload_from_line(line: &[u8]) -> Option<String> {
        match std::str::from_utf8(line) {
            Ok(text) => extract_data_payload(text.trim()).map(str::to_owned),
            Err(e) => {
                warn!("dropping SSE line with invalid UTF-8: {e}");
                None
            }
        }
    }
}

/// Turns a streaming response body into text fragments.
///
/// The returned stream ends when the body is exhausted or `extract` reports
/// [`Frame::Done`], and fails only if reading the body fails. Empty fragments
/// are never yielded.
pub fn decode_stream<S, B, E, F>(
    body: S,
    mut extract: F,
) -> impl Stream<Item = Result<String, ChatError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
    F: FnMut(&str) -> Frame,
{
    try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = std::pin::pin!(body);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<ChatError>::into)?;
            for payload in decoder.push(chunk.as_ref()) {
                trace!("sse payload: {payload}");
                match extract(&payload) {
                    Frame::Text(text) if !text.is_empty() => yield text,
                    Frame::Done => return,
                    _ => {}
                }
            }
        }

        if let Some(payload) = decoder.finish() {
            trace!("trailing sse payload: {payload}");
            if let Frame::Text(text) = extract(&payload) {
                if !text.is_empty() {
                    yield text;
                }
            }
        }
    }
}
