use std::io::{self, Write};

use crate::core::render::RenderSink;

const THINKING: &str = "thinking…";

/// Prints revealed text to stdout and the waiting indicator to stderr.
pub struct TerminalSink<W: Write = io::Stdout> {
    out: W,
    thinking_shown: bool,
}

impl TerminalSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            thinking_shown: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Write errors are dropped: a closed terminal should not abort the turn.
impl<W: Write> RenderSink for TerminalSink<W> {
    fn reveal(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn thinking(&mut self, active: bool) {
        let mut err = io::stderr();
        if active && !self.thinking_shown {
            let _ = write!(err, "{THINKING}");
            self.thinking_shown = true;
        } else if !active && self.thinking_shown {
            let _ = write!(err, "\r\x1b[K");
            self.thinking_shown = false;
        }
        let _ = err.flush();
    }
}
