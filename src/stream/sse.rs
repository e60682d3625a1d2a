//! SSE plumbing around the translator: re-splitting the upstream byte stream
//! into line records, and writing translator output as client SSE records.
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::{memchr, memrchr};
use smallvec::SmallVec;

use super::metrics::ExchangeMetrics;
use super::transcoder::{OutgoingEvent, StreamTranslator};

/// Sentinel record closing a client stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

// ---------------------------------------------------------------------------
// LineBuffer — upstream bytes -> newline-terminated text
// ---------------------------------------------------------------------------

/// Longest partial line held while waiting for its newline.
pub const MAX_PENDING_LINE: usize = 1 << 20;

/// Accumulates upstream bytes and releases only complete lines.
///
/// Network chunks split records (and UTF-8 sequences) at arbitrary byte
/// offsets. Cutting only after `\n` keeps every released slice a whole set of
/// lines, and never splits a multi-byte character since `\n` cannot occur
/// inside one.
///
/// A partial line growing past the limit is dropped, along with the rest of
/// it up to the next newline.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_LINE)
    }
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            discarding: false,
        }
    }

    /// Append `bytes`; return every complete line buffered so far.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        let bytes = if self.discarding {
            let newline = memchr(b'\n', bytes)?;
            self.discarding = false;
            &bytes[newline + 1..]
        } else {
            bytes
        };
        self.buffer.extend_from_slice(bytes);
        let Some(last_newline) = memrchr(b'\n', &self.buffer) else {
            self.drop_if_overlong();
            return None;
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);
        self.drop_if_overlong();
        Some(String::from_utf8_lossy(&complete).into_owned())
    }

    fn drop_if_overlong(&mut self) {
        if self.buffer.len() > self.limit {
            tracing::debug!(pending = self.buffer.len(), "dropping overlong upstream line");
            self.buffer = Vec::new();
            self.discarding = true;
        }
    }

    /// Drain whatever is left once the upstream has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

// ---------------------------------------------------------------------------
// Client encoding
// ---------------------------------------------------------------------------

/// Encode one translator output as a client SSE record.
///
/// Returns `None` only if a chunk fails to serialize, in which case the record
/// is dropped rather than written half-formed.
#[must_use]
pub fn encode_outgoing_sse(event: &OutgoingEvent) -> Option<Bytes> {
    match event {
        OutgoingEvent::Terminal => Some(Bytes::from_static(DONE_FRAME.as_bytes())),
        OutgoingEvent::Chunk(chunk) => {
            let json = match serde_json::to_vec(chunk) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize stream chunk");
                    return None;
                }
            };
            let mut out = Vec::with_capacity(json.len() + 8);
            out.extend_from_slice(b"data: ");
            out.extend_from_slice(&json);
            out.extend_from_slice(b"\n\n");
            Some(Bytes::from(out))
        }
    }
}

// ---------------------------------------------------------------------------
// Stream adapter
// ---------------------------------------------------------------------------

struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn push(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }
}

struct TranslateState<S, F>
where
    F: FnOnce(&ExchangeMetrics, bool),
{
    upstream: Pin<Box<S>>,
    lines: LineBuffer,
    translator: StreamTranslator,
    scratch: Vec<OutgoingEvent>,
    pending: PendingFrames,
    finished: bool,
    on_finish: Option<F>,
}

impl<S, F> TranslateState<S, F>
where
    F: FnOnce(&ExchangeMetrics, bool),
{
    fn feed(&mut self, text: &str) {
        self.translator.process_fragment_into(text, &mut self.scratch);
        for event in self.scratch.drain(..) {
            if let Some(frame) = encode_outgoing_sse(&event) {
                self.pending.push(frame);
            }
        }
        if self.translator.is_terminated() {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(self.translator.metrics(), self.translator.is_terminated());
        }
    }
}

// Client went away mid-stream: still report what was counted.
impl<S, F> Drop for TranslateState<S, F>
where
    F: FnOnce(&ExchangeMetrics, bool),
{
    fn drop(&mut self) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish(self.translator.metrics(), false);
        }
    }
}

/// Drive `translator` over an upstream byte stream, yielding client SSE records.
///
/// The upstream is polled only when no translated record is waiting, and is
/// dropped as soon as the terminal record has been queued. `on_finish` runs
/// once with the final metrics and whether the exchange terminated normally,
/// including when the client drops the stream early. An upstream error or
/// early close ends the client stream without `[DONE]`.
pub fn translated_sse_stream<S, E, F>(
    upstream: S,
    translator: StreamTranslator,
    on_finish: F,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce(&ExchangeMetrics, bool) + Send + 'static,
{
    let state = TranslateState {
        upstream: Box::pin(upstream),
        lines: LineBuffer::new(),
        translator,
        scratch: Vec::with_capacity(4),
        pending: PendingFrames::new(),
        finished: false,
        on_finish: Some(on_finish),
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            match state.upstream.as_mut().next().await {
                Some(Ok(bytes)) => {
                    if let Some(text) = state.lines.push(&bytes) {
                        state.feed(&text);
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "upstream stream failed mid-exchange");
                    state.finish();
                }
                None => {
                    if let Some(rest) = state.lines.finish() {
                        state.feed(&rest);
                    }
                    if !state.finished {
                        state.finish();
                    }
                }
            }
        }
    })
}
