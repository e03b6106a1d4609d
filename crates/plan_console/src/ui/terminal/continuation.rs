//! Multi-line input: a submitted line ending in a single backslash continues
//! the message on the next line.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The message is finished.
    Complete { message: String },
    /// More lines are expected; `accumulated` holds everything so far.
    Incomplete { accumulated: Vec<String> },
}

/// Decide whether `line` finishes the message started by `prior`.
///
/// A line ending in exactly one backslash has it stripped and keeps the
/// message open. Any other line (including an empty one submitted mid-message)
/// is appended and completes the message.
pub fn process_line(line: &str, mut prior: Vec<String>) -> LineOutcome {
    if let Some(stripped) = continued(line) {
        prior.push(stripped.to_string());
        return LineOutcome::Incomplete { accumulated: prior };
    }
    prior.push(line.to_string());
    LineOutcome::Complete {
        message: prior.join("\n"),
    }
}

fn continued(line: &str) -> Option<&str> {
    let stripped = line.strip_suffix('\\')?;
    if stripped.ends_with('\\') {
        // `\\` is an escaped backslash, not a continuation.
        return None;
    }
    Some(stripped)
}

/// Lines committed so far for the message being typed.
#[derive(Debug, Default)]
pub struct Accumulator {
    lines: Vec<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one submitted line; returns the full message once it completes.
    pub fn submit(&mut self, line: &str) -> Option<String> {
        match process_line(line, std::mem::take(&mut self.lines)) {
            LineOutcome::Complete { message } => Some(message),
            LineOutcome::Incomplete { accumulated } => {
                self.lines = accumulated;
                None
            }
        }
    }

    pub fn is_accumulating(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }
}
