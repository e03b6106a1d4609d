use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{ChatMessage, EventBus, Provider, ProviderError, ProviderEvent, ToolCall};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Text(String),
    ToolCall(ToolCall),
    Pause(Duration),
    /// Emit an error event and end the turn.
    Fail(String),
}

impl ScriptStep {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptStep::Text(text.into())
    }

    pub fn tool(name: impl Into<String>, args: serde_json::Value) -> Self {
        ScriptStep::ToolCall(ToolCall::new(name, args))
    }
}

/// Split `text` into `chunk` sized pieces separated by `delay`, the way a
/// model streams tokens.
pub fn streamed(text: &str, chunk: usize, delay: Duration) -> Vec<ScriptStep> {
    let chars: Vec<char> = text.chars().collect();
    let mut steps = Vec::new();
    for piece in chars.chunks(chunk.max(1)) {
        if !steps.is_empty() && !delay.is_zero() {
            steps.push(ScriptStep::Pause(delay));
        }
        steps.push(ScriptStep::Text(piece.iter().collect()));
    }
    steps
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub message: String,
    pub history_len: usize,
}

/// In-process provider that replays queued turns. Used for `--demo` and in
/// tests.
pub struct ScriptedProvider {
    name: String,
    events: EventBus,
    turns: Mutex<VecDeque<Vec<ScriptStep>>>,
    echo_fallback: bool,
    current: Mutex<CancellationToken>,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            name: "scripted".to_string(),
            events: EventBus::new(),
            turns: Mutex::new(turns.into()),
            echo_fallback: false,
            current: Mutex::new(CancellationToken::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Once the queued turns run out, answer by echoing the message back.
    pub fn with_echo_fallback(mut self) -> Self {
        self.echo_fallback = true;
        self
    }

    pub fn push_turn(&self, steps: Vec<ScriptStep>) {
        lock(&self.turns).push_back(steps);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        lock(&self.sent).clone()
    }

    /// A short scripted planning session for `--demo`.
    pub fn demo() -> Self {
        let pace = Duration::from_millis(25);
        let mut first = vec![ScriptStep::Pause(Duration::from_millis(600))];
        first.extend(streamed(
            "Let me look at what is already in the repository.\n",
            6,
            pace,
        ));
        first.push(ScriptStep::tool("list_files", json!({"path": "."})));
        first.push(ScriptStep::Pause(Duration::from_millis(700)));
        first.push(ScriptStep::tool("read_file", json!({"path": "Cargo.toml"})));
        first.push(ScriptStep::Pause(Duration::from_millis(500)));
        first.extend(streamed(
            concat!(
                "## Plan\n\n",
                "- [x] Survey the **workspace**\n",
                "- [ ] Draft the `plan.md` outline\n",
                "- [ ] Review with the team\n\n",
                "```sh\ncargo test --workspace\n```\n\n",
                "> Ask again with *more detail* to refine.\n",
            ),
            5,
            pace,
        ));

        Self::new(vec![first]).with_name("demo").with_echo_fallback()
    }

    fn next_turn(&self, message: &str) -> Vec<ScriptStep> {
        if let Some(turn) = lock(&self.turns).pop_front() {
            return turn;
        }
        if self.echo_fallback {
            let mut steps = vec![ScriptStep::Pause(Duration::from_millis(300))];
            steps.extend(streamed(
                &format!("You said: *{}*\n", message.replace('\n', " ")),
                4,
                Duration::from_millis(20),
            ));
            steps
        } else {
            vec![ScriptStep::Fail("no scripted turn left".to_string())]
        }
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.current) = token.clone();
        token
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    async fn send(&self, message: &str, history: &[ChatMessage]) -> Result<(), ProviderError> {
        lock(&self.sent).push(SentRequest {
            message: message.to_string(),
            history_len: history.len(),
        });
        let token = self.begin();

        for step in self.next_turn(message) {
            if token.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match step {
                ScriptStep::Text(text) => self.events.emit(ProviderEvent::Text(text)),
                ScriptStep::ToolCall(call) => self.events.emit(ProviderEvent::ToolCall(call)),
                ScriptStep::Pause(delay) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(ProviderError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                ScriptStep::Fail(message) => {
                    self.events.emit(ProviderEvent::Error(message.clone()));
                    return Err(ProviderError::Backend(message));
                }
            }
            tokio::task::yield_now().await;
        }

        if token.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        self.events.emit(ProviderEvent::Done);
        Ok(())
    }

    fn cancel(&self) {
        tracing::debug!(provider = %self.name, "cancel requested");
        lock(&self.current).cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ListenerGuard;

    #[test]
    fn streamed_splits_with_pauses() {
        let steps = streamed("abcde", 2, Duration::from_millis(1));
        assert_eq!(
            steps,
            vec![
                ScriptStep::text("ab"),
                ScriptStep::Pause(Duration::from_millis(1)),
                ScriptStep::text("cd"),
                ScriptStep::Pause(Duration::from_millis(1)),
                ScriptStep::text("e"),
            ]
        );
    }

    #[tokio::test]
    async fn replays_turn_then_done() {
        let provider = ScriptedProvider::new(vec![vec![
            ScriptStep::text("hi"),
            ScriptStep::tool("search", json!({"q": "x"})),
        ]]);
        let (guard, mut rx) = ListenerGuard::attach(provider.events());
        provider.send("go", &[]).await.unwrap();
        drop(guard);

        assert_eq!(rx.recv().await, Some(ProviderEvent::Text("hi".into())));
        assert!(matches!(rx.recv().await, Some(ProviderEvent::ToolCall(_))));
        assert_eq!(rx.recv().await, Some(ProviderEvent::Done));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn fail_step_emits_error_and_rejects() {
        let provider = ScriptedProvider::new(vec![vec![ScriptStep::Fail("boom".into())]]);
        let (_guard, mut rx) = ListenerGuard::attach(provider.events());
        let result = provider.send("go", &[]).await;
        assert!(matches!(result, Err(ProviderError::Backend(ref m)) if m == "boom"));
        assert_eq!(rx.try_recv().unwrap(), ProviderEvent::Error("boom".into()));
    }

    #[tokio::test]
    async fn exhausted_script_fails_without_fallback() {
        let provider = ScriptedProvider::new(Vec::new());
        assert!(provider.send("go", &[]).await.is_err());
    }

    #[tokio::test]
    async fn echo_fallback_answers() {
        let provider = ScriptedProvider::new(Vec::new()).with_echo_fallback();
        let (_guard, mut rx) = ListenerGuard::attach(provider.events());
        provider.send("ping", &[]).await.unwrap();
        let mut text = String::new();
        while let Ok(event) = rx.try_recv() {
            if let ProviderEvent::Text(chunk) = event {
                text.push_str(&chunk);
            }
        }
        assert_eq!(text, "You said: *ping*\n");
    }

    #[tokio::test]
    async fn cancel_interrupts_pause() {
        let provider = ScriptedProvider::new(vec![vec![
            ScriptStep::Pause(Duration::from_secs(60)),
            ScriptStep::text("never"),
        ]]);
        let send = provider.send("go", &[]);
        tokio::pin!(send);
        tokio::select! {
            _ = &mut send => panic!("send finished before cancel"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        provider.cancel();
        assert!(matches!(send.await, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn records_history_length() {
        let provider = ScriptedProvider::new(vec![vec![]]);
        provider
            .send("go", &[ChatMessage::user("a"), ChatMessage::assistant("b")])
            .await
            .unwrap();
        assert_eq!(
            provider.sent(),
            vec![SentRequest {
                message: "go".into(),
                history_len: 2
            }]
        );
    }
}
