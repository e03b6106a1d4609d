use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::markdown_stream::MarkdownStreamRenderer;
use crate::provider::{
    ChatMessage, ListenerGuard, Provider, ProviderError, ProviderEvent, ToolCall,
};
use crate::ui::terminal::indicator::{ThinkingIndicator, ToolCallIndicator};
use crate::ui::terminal::screen::{Screen, NEWLINE};
use crate::ui::terminal::style;

const MESSAGE_PREFIX: &str = "◆";
const IDLE_TICK: Duration = Duration::from_millis(250);

/// How a single outbound message ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Stream finished normally; `text` is the full assistant reply.
    Completed { text: String },
    Failed { message: String },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Thinking,
    StreamingText,
    RunningTool,
    Done,
    Errored,
    Cancelled,
}

impl StreamPhase {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Done | StreamPhase::Errored | StreamPhase::Cancelled
        )
    }
}

enum ActiveIndicator {
    Thinking(ThinkingIndicator),
    Tool(ToolCallIndicator),
}

impl ActiveIndicator {
    fn tick(&mut self) {
        match self {
            ActiveIndicator::Thinking(indicator) => indicator.tick(),
            ActiveIndicator::Tool(indicator) => indicator.tick(),
        }
    }

    fn interval(&self) -> Duration {
        match self {
            ActiveIndicator::Thinking(indicator) => indicator.interval(),
            ActiveIndicator::Tool(indicator) => indicator.interval(),
        }
    }

    /// `success` only matters for tool indicators; thinking just clears.
    fn stop(&mut self, success: bool) {
        match self {
            ActiveIndicator::Thinking(indicator) => indicator.stop(),
            ActiveIndicator::Tool(indicator) => indicator.stop(success),
        }
    }
}

/// Per-message state. Created fresh for every `run`.
struct StreamState {
    phase: StreamPhase,
    active: Option<ActiveIndicator>,
    text: String,
    outcome: Option<StreamOutcome>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            phase: StreamPhase::Idle,
            active: None,
            text: String::new(),
            outcome: None,
        }
    }

    fn stop_active(&mut self, success: bool) {
        if let Some(mut indicator) = self.active.take() {
            indicator.stop(success);
        }
    }

    fn tick_interval(&self) -> Duration {
        self.active
            .as_ref()
            .map_or(IDLE_TICK, ActiveIndicator::interval)
    }
}

/// Drives one provider turn at a time: indicators, markdown output, blank
/// line grouping between text and tool calls, and cancellation.
pub struct StreamController {
    screen: Screen,
    renderer: MarkdownStreamRenderer,
    phase: StreamPhase,
}

impl StreamController {
    pub fn new(screen: Screen) -> Self {
        Self {
            renderer: MarkdownStreamRenderer::new(screen.clone()),
            screen,
            phase: StreamPhase::Idle,
        }
    }

    /// Phase the most recent turn ended in.
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Send `message` and render the resulting stream until it finishes,
    /// fails or `cancel` fires.
    pub async fn run<P>(
        &mut self,
        provider: &P,
        message: &str,
        history: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> StreamOutcome
    where
        P: Provider + ?Sized,
    {
        self.renderer.reset();
        let mut state = StreamState::new();
        if cancel.is_cancelled() {
            self.finish_cancelled(&mut state);
            return StreamOutcome::Cancelled;
        }

        let (guard, mut rx) = ListenerGuard::attach(provider.events());
        debug!(provider = provider.name(), "stream started");

        let mut thinking = ThinkingIndicator::new(self.screen.clone());
        thinking.start();
        state.active = Some(ActiveIndicator::Thinking(thinking));
        state.phase = StreamPhase::Thinking;

        let send = provider.send(message, history);
        tokio::pin!(send);
        let mut send_done = false;
        let mut tick_every = state.tick_interval();
        let mut ticker = frame_ticker(tick_every);

        while state.outcome.is_none() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    provider.cancel();
                    self.finish_cancelled(&mut state);
                    if !send_done {
                        // Let the provider wind down instead of dropping it mid-flight.
                        if let Err(err) = send.as_mut().await {
                            debug!("provider send after cancel: {err}");
                        }
                    }
                }
                Some(event) = rx.recv() => {
                    self.handle_event(&mut state, event, cancel);
                }
                result = send.as_mut(), if !send_done => {
                    send_done = true;
                    while let Ok(event) = rx.try_recv() {
                        if state.outcome.is_some() {
                            break;
                        }
                        self.handle_event(&mut state, event, cancel);
                    }
                    if state.outcome.is_none() {
                        self.settle(&mut state, result, cancel);
                    }
                }
                _ = ticker.tick() => {
                    if let Some(indicator) = state.active.as_mut() {
                        indicator.tick();
                    }
                }
            }

            let wanted = state.tick_interval();
            if wanted != tick_every {
                tick_every = wanted;
                ticker = frame_ticker(tick_every);
            }
        }

        drop(guard);
        self.phase = state.phase;
        debug!(phase = ?state.phase, "stream finished");
        state.outcome.unwrap_or(StreamOutcome::Cancelled)
    }

    fn handle_event(
        &mut self,
        state: &mut StreamState,
        event: ProviderEvent,
        cancel: &CancellationToken,
    ) {
        if state.phase.is_terminal() {
            return;
        }
        match event {
            ProviderEvent::Text(text) => self.on_text(state, &text),
            ProviderEvent::ToolCall(call) => self.on_tool_call(state, &call),
            ProviderEvent::Done => {
                if cancel.is_cancelled() {
                    self.finish_cancelled(state);
                } else {
                    self.finish_done(state);
                }
            }
            ProviderEvent::Error(message) => {
                if cancel.is_cancelled() {
                    self.finish_cancelled(state);
                } else {
                    self.finish_error(state, &message);
                }
            }
        }
    }

    fn on_text(&mut self, state: &mut StreamState, text: &str) {
        if text.is_empty() {
            return;
        }
        if state.phase != StreamPhase::StreamingText {
            state.stop_active(true);
            self.screen.write_str(&format!(
                "{} ",
                style::bold_colored(MESSAGE_PREFIX, style::RUNNING)
            ));
            state.phase = StreamPhase::StreamingText;
        }
        self.renderer.write(text);
        state.text.push_str(text);
    }

    fn on_tool_call(&mut self, state: &mut StreamState, call: &ToolCall) {
        // One blank line after text; consecutive tool calls stay grouped.
        if state.phase == StreamPhase::StreamingText {
            self.renderer.flush();
            self.screen.newline();
        }
        state.stop_active(true);
        debug!(tool = %call.name, "tool call started");
        let indicator = ToolCallIndicator::start(self.screen.clone(), &call.name, &call.summary());
        state.active = Some(ActiveIndicator::Tool(indicator));
        state.phase = StreamPhase::RunningTool;
    }

    fn finish_done(&mut self, state: &mut StreamState) {
        state.stop_active(true);
        self.renderer.flush();
        state.phase = StreamPhase::Done;
        state.outcome = Some(StreamOutcome::Completed {
            text: std::mem::take(&mut state.text),
        });
    }

    fn finish_error(&mut self, state: &mut StreamState, message: &str) {
        // The last tool did finish; it is the stream as a whole that failed.
        state.stop_active(true);
        self.renderer.flush();
        warn!("provider stream failed: {message}");
        self.screen.write_str(&format!(
            "{}{NEWLINE}",
            style::colored(&format!("✗ Error: {message}"), style::FAILURE)
        ));
        state.phase = StreamPhase::Errored;
        state.text.clear();
        state.outcome = Some(StreamOutcome::Failed {
            message: message.to_string(),
        });
    }

    fn finish_cancelled(&mut self, state: &mut StreamState) {
        if state.phase == StreamPhase::Cancelled {
            return;
        }
        let streaming = state.phase == StreamPhase::StreamingText;
        state.stop_active(false);
        if streaming {
            // Show the partial line; only the reply text is discarded.
            if self.renderer.has_pending() {
                self.renderer.flush();
            } else {
                self.screen.newline();
            }
        }
        self.renderer.reset();
        self.screen.write_str(&format!(
            "{}{NEWLINE}",
            style::colored("⏹ Cancelled", style::LABEL)
        ));
        state.phase = StreamPhase::Cancelled;
        state.text.clear();
        state.outcome = Some(StreamOutcome::Cancelled);
    }

    /// The send future resolved without a terminal event reaching us.
    fn settle(
        &mut self,
        state: &mut StreamState,
        result: Result<(), ProviderError>,
        cancel: &CancellationToken,
    ) {
        match result {
            _ if cancel.is_cancelled() => self.finish_cancelled(state),
            Ok(()) => self.finish_done(state),
            Err(ProviderError::Cancelled) => self.finish_cancelled(state),
            Err(err) => self.finish_error(state, &err.to_string()),
        }
    }
}

fn frame_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
