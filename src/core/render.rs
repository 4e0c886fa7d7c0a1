//! Paces streamed text onto the screen.
//!
//! Vendors deliver text in bursts. The scheduler absorbs fragments as fast
//! as they arrive and hands them out on a fixed tick, a fifth of the
//! outstanding backlog at a time, so large bursts catch up quickly while a
//! trickle still reads smoothly.

use std::time::Duration;

use crate::core::config::data::DEFAULT_TICK_MS;

/// Fraction of the backlog revealed per tick.
const CATCH_UP_DIVISOR: usize = 5;

/// Receives revealed text as it becomes visible.
pub trait RenderSink {
    /// Called with each newly revealed slice, in order.
    fn reveal(&mut self, text: &str);

    /// Toggled on while waiting for the first fragment and off once it lands.
    fn thinking(&mut self, _active: bool) {}
}

/// Per-send stream bookkeeping. Lengths are counted in characters.
#[derive(Debug, Clone)]
pub struct StreamState {
    accumulated: String,
    accumulated_chars: usize,
    revealed_bytes: usize,
    revealed_chars: usize,
    thinking: bool,
    finished: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            accumulated: String::new(),
            accumulated_chars: 0,
            revealed_bytes: 0,
            revealed_chars: 0,
            thinking: true,
            finished: false,
        }
    }
}

impl StreamState {
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn revealed(&self) -> &str {
        &self.accumulated[..self.revealed_bytes]
    }

    pub fn accumulated_len(&self) -> usize {
        self.accumulated_chars
    }

    pub fn revealed_len(&self) -> usize {
        self.revealed_chars
    }

    /// Characters received but not yet revealed.
    pub fn deficit(&self) -> usize {
        self.accumulated_chars - self.revealed_chars
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    state: StreamState,
    tick_interval: Duration,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TICK_MS))
    }
}

impl RenderScheduler {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            state: StreamState::default(),
            tick_interval,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Appends a fragment. Never reveals anything by itself.
    pub fn push(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.state.accumulated.push_str(fragment);
        self.state.accumulated_chars += fragment.chars().count();
        self.state.thinking = false;
    }

    /// Records that the network stream has ended.
    pub fn finish(&mut self) {
        self.state.finished = true;
    }

    /// Reveals the next `max(1, ceil(deficit / 5))` characters.
    pub fn tick(&mut self) -> Option<&str> {
        let deficit = self.state.deficit();
        if deficit == 0 {
            return None;
        }
        let step = deficit.div_ceil(CATCH_UP_DIVISOR).max(1);
        Some(self.advance(step))
    }

    /// Reveals the whole backlog at once.
    pub fn flush(&mut self) -> Option<&str> {
        let deficit = self.state.deficit();
        if deficit == 0 {
            return None;
        }
        Some(self.advance(deficit))
    }

    fn advance(&mut self, chars: usize) -> &str {
        let start = self.state.revealed_bytes;
        let tail = &self.state.accumulated[start..];
        let end = tail
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| start + offset)
            .unwrap_or(self.state.accumulated.len());

        self.state.revealed_bytes = end;
        self.state.revealed_chars += chars.min(self.state.accumulated_chars - self.state.revealed_chars);
        &self.state.accumulated[start..end]
    }

    /// True once the network stream has ended and every character is visible.
    pub fn is_settled(&self) -> bool {
        self.state.finished && self.state.deficit() == 0
    }

    /// Everything received, revealed or not.
    pub fn into_text(self) -> String {
        self.state.accumulated
    }
}
