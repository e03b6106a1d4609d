use tokio_util::sync::CancellationToken;

use super::continuation::Accumulator;
use super::line_editor::{CONTINUATION_PROMPT, PROMPT};

/// What an interrupt (Ctrl-C) means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// A stream was in flight; its token has been cancelled.
    CancelStream,
    /// Multi-line input was discarded.
    AbortContinuation,
    Shutdown,
}

/// Per-session input state: the continuation accumulator and the token of the
/// stream in flight, if any.
#[derive(Debug, Default)]
pub struct SessionContext {
    accumulator: Accumulator,
    active_stream: Option<CancellationToken>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one submitted line; returns the message once it is complete.
    pub fn submit_line(&mut self, line: &str) -> Option<String> {
        self.accumulator.submit(line)
    }

    pub fn is_accumulating(&self) -> bool {
        self.accumulator.is_accumulating()
    }

    pub fn prompt(&self) -> &'static str {
        if self.is_accumulating() {
            CONTINUATION_PROMPT
        } else {
            PROMPT
        }
    }

    /// Register a new stream and hand back its cancellation token.
    pub fn begin_stream(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.active_stream = Some(token.clone());
        token
    }

    pub fn end_stream(&mut self) {
        self.active_stream = None;
    }

    pub fn on_interrupt(&mut self) -> InterruptAction {
        if let Some(token) = &self.active_stream {
            if !token.is_cancelled() {
                tracing::debug!("interrupt: cancelling active stream");
                token.cancel();
            }
            return InterruptAction::CancelStream;
        }
        if self.accumulator.is_accumulating() {
            tracing::debug!("interrupt: discarding multi-line input");
            self.accumulator.reset();
            return InterruptAction::AbortContinuation;
        }
        InterruptAction::Shutdown
    }
}
