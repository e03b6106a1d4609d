use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{ChatMessage, Role};

const SESSION_FILE: &str = "session.json";
const LABEL_MAX_CHARS: usize = 48;
const UNTITLED: &str = "untitled session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub label: String,
    pub saved_at: DateTime<Utc>,
    pub provider: String,
    pub messages: Vec<ChatMessage>,
}

/// Writes the finished session to `<dir>/session.json`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn save(&self, session: &Session) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create session directory {}", self.dir.display()))?;
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session).context("failed to encode session")?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move session into {}", path.display()))?;
        tracing::info!(path = %path.display(), label = %session.label, "session saved");
        Ok(path)
    }

    pub fn load(&self) -> Result<Option<Session>> {
        load_file(&self.path())
    }
}

fn load_file(path: &Path) -> Result<Option<Session>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let session = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(session))
}

/// Session label: the explicit one if given, otherwise the first user
/// message flattened to one line and cut to 48 characters.
pub fn derive_label(explicit: Option<&str>, history: &[ChatMessage]) -> String {
    if let Some(label) = explicit.map(str::trim).filter(|l| !l.is_empty()) {
        return label.to_string();
    }
    let Some(first) = history.iter().find(|m| m.role == Role::User) else {
        return UNTITLED.to_string();
    };
    let flat = first.content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return UNTITLED.to_string();
    }
    if flat.chars().count() <= LABEL_MAX_CHARS {
        return flat;
    }
    let mut label: String = flat.chars().take(LABEL_MAX_CHARS - 1).collect();
    label.push('…');
    label
}
