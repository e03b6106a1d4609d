// Subprocess-backed provider.
//
// Wire format: one JSON request line on stdin, newline-delimited JSON events
// on stdout. stderr is forwarded to the log.

use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::{ChatMessage, EventBus, Provider, ProviderError, ProviderEvent, ToolCall};

pub const DEFAULT_GRACE: Duration = Duration::from_millis(2000);

#[derive(Serialize)]
struct Request<'a> {
    message: &'a str,
    history: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text {
        text: String,
    },
    ToolCall {
        name: String,
        #[serde(default)]
        args: Value,
    },
    Done,
    Error {
        message: String,
    },
}

impl From<WireEvent> for ProviderEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Text { text } => ProviderEvent::Text(text),
            WireEvent::ToolCall { name, args } => ProviderEvent::ToolCall(ToolCall { name, args }),
            WireEvent::Done => ProviderEvent::Done,
            WireEvent::Error { message } => ProviderEvent::Error(message),
        }
    }
}

/// Parse one stdout line. Blank, malformed and unknown-typed lines yield `None`.
pub fn parse_event_line(line: &str) -> Option<ProviderEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<WireEvent>(trimmed) {
        Ok(event) => Some(event.into()),
        Err(err) => {
            tracing::warn!("skipping provider line {trimmed:?}: {err}");
            None
        }
    }
}

pub struct CommandProvider {
    name: String,
    command: String,
    grace: Duration,
    events: EventBus,
    current: Mutex<CancellationToken>,
}

impl CommandProvider {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            grace: DEFAULT_GRACE,
            events: EventBus::new(),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current() = token.clone();
        token
    }

    fn current(&self) -> MutexGuard<'_, CancellationToken> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn spawn(&self) -> Result<Child, ProviderError> {
        Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                command: self.command.clone(),
                source,
            })
    }

    /// Ask the child to exit, escalating to a kill after the grace period.
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // SAFETY: plain kill(2) on a pid we spawned and have not reaped.
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc == 0 {
                    match tokio::time::timeout(self.grace, child.wait()).await {
                        Ok(Ok(status)) => {
                            tracing::debug!(
                                provider = %self.name,
                                %status,
                                "provider exited after SIGTERM"
                            );
                            return;
                        }
                        Ok(Err(err)) => tracing::warn!("waiting for provider failed: {err}"),
                        Err(_) => tracing::debug!(
                            provider = %self.name,
                            grace_ms = self.grace.as_millis() as u64,
                            "provider ignored SIGTERM, killing"
                        ),
                    }
                }
            }
        }
        if let Err(err) = child.kill().await {
            tracing::warn!("failed to kill provider process: {err}");
        }
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    async fn send(&self, message: &str, history: &[ChatMessage]) -> Result<(), ProviderError> {
        let token = self.begin();
        let mut child = self.spawn()?;
        tracing::debug!(provider = %self.name, pid = ?child.id(), "provider process started");

        let mut request = serde_json::to_vec(&Request { message, history })?;
        request.push(b'\n');
        let mut stdin = child.stdin.take().ok_or(ProviderError::MissingPipe("stdin"))?;
        // A provider that exits without reading its input is not an error here.
        if let Err(err) = stdin.write_all(&request).await {
            tracing::debug!("provider did not accept request: {err}");
        }
        drop(stdin);

        if let Some(stderr) = child.stderr.take() {
            let name = self.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::info!(provider = %name, "stderr: {line}");
                }
            });
        }

        let stdout = child.stdout.take().ok_or(ProviderError::MissingPipe("stdout"))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut outcome: Option<Result<(), ProviderError>> = None;

        while outcome.is_none() {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.terminate(&mut child).await;
                    return Err(ProviderError::Cancelled);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let Some(event) = parse_event_line(&line) else {
                        continue;
                    };
                    match &event {
                        ProviderEvent::Done => outcome = Some(Ok(())),
                        ProviderEvent::Error(message) => {
                            outcome = Some(Err(ProviderError::Backend(message.clone())));
                        }
                        _ => {}
                    }
                    self.events.emit(event);
                }
            }
        }

        if let Some(outcome) = outcome {
            // Turn already ended; bound the wait for exit.
            match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    tracing::debug!(provider = %self.name, %status, "provider process exited");
                }
                Err(_) => self.terminate(&mut child).await,
            }
            return outcome;
        }

        let status = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.terminate(&mut child).await;
                return Err(ProviderError::Cancelled);
            }
            status = child.wait() => status?,
        };
        tracing::debug!(provider = %self.name, %status, "provider process exited");

        if status.success() {
            self.events.emit(ProviderEvent::Done);
            Ok(())
        } else {
            self.events
                .emit(ProviderEvent::Error(format!("provider exited with {status}")));
            Err(ProviderError::Exit(status))
        }
    }

    fn cancel(&self) {
        tracing::debug!(provider = %self.name, "cancel requested");
        self.current().cancel();
    }
}
