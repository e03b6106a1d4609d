//! SGR styling roles used across the terminal output.

use std::sync::LazyLock;

use crossterm::style::{Color, Stylize};
use regex::Regex;

/// Background used for inline code spans.
pub const CODE_BG: Color = Color::AnsiValue(236);

pub const RUNNING: Color = Color::Cyan;
pub const SUCCESS: Color = Color::Green;
pub const FAILURE: Color = Color::Red;
pub const LABEL: Color = Color::Yellow;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ANSI escape pattern is valid")
});

pub fn bold(text: &str) -> String {
    text.bold().to_string()
}

pub fn dim(text: &str) -> String {
    text.dim().to_string()
}

pub fn italic(text: &str) -> String {
    text.italic().to_string()
}

pub fn bold_italic(text: &str) -> String {
    text.bold().italic().to_string()
}

pub fn colored(text: &str, color: Color) -> String {
    text.with(color).to_string()
}

pub fn bold_colored(text: &str, color: Color) -> String {
    text.with(color).bold().to_string()
}

pub fn code_span(text: &str) -> String {
    text.on(CODE_BG).to_string()
}

/// Remove SGR and cursor control sequences, leaving the visible text.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_recovers_plain_text() {
        let styled = format!("{} and {}", bold("strong"), code_span("code"));
        assert_ne!(styled, "strong and code");
        assert_eq!(strip_ansi(&styled), "strong and code");
    }

    #[test]
    fn strip_ansi_removes_cursor_controls() {
        assert_eq!(strip_ansi("\x1b[1G\x1b[2Kdone\x1b[?25h"), "done");
    }
}
