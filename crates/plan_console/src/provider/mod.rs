//! Provider seam: anything that turns a user message into a stream of
//! text / tool-call / done / error events.
//!
//! The stream controller only depends on [`Provider`] and [`EventBus`], so a
//! scripted in-process backend and a subprocess backend are interchangeable.

pub mod command;
pub mod events;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use command::CommandProvider;
pub use events::{EventBus, ListenerGuard, ListenerId};
pub use scripted::{ScriptStep, ScriptedProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// One-line `key=value, ...` rendering of the arguments.
    pub fn summary(&self) -> String {
        match &self.args {
            Value::Null => String::new(),
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| format!("{key}={}", summarize_value(value)))
                .collect::<Vec<_>>()
                .join(", "),
            other => summarize_value(other),
        }
    }
}

fn summarize_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Text(String),
    ToolCall(ToolCall),
    Done,
    Error(String),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::Text(_) => EventKind::Text,
            ProviderEvent::ToolCall(_) => EventKind::ToolCall,
            ProviderEvent::Done => EventKind::Done,
            ProviderEvent::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Text,
    ToolCall,
    Done,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Text,
        EventKind::ToolCall,
        EventKind::Done,
        EventKind::Error,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("provider I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("provider process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("provider exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("{0}")]
    Backend(String),
    #[error("request cancelled")]
    Cancelled,
}

/// A model backend. `send` resolves when the turn is over; events for the turn
/// are delivered through [`Provider::events`] while it runs.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn events(&self) -> &EventBus;

    async fn send(&self, message: &str, history: &[ChatMessage]) -> Result<(), ProviderError>;

    /// Best-effort request to stop the turn in flight.
    fn cancel(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_summary_formats() {
        let call = ToolCall::new("search", json!({"query": "plans", "limit": 3}));
        assert_eq!(call.summary(), "limit=3, query=plans");
        assert_eq!(ToolCall::new("noop", Value::Null).summary(), "");
        assert_eq!(ToolCall::new("echo", json!("hi")).summary(), "hi");
    }

    #[test]
    fn chat_message_roles_serialize_lowercase() {
        let encoded = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(encoded, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[test]
    fn event_kind_matches_variant() {
        assert_eq!(ProviderEvent::Done.kind(), EventKind::Done);
        assert_eq!(
            ProviderEvent::Error("x".into()).kind(),
            EventKind::Error
        );
    }
}
