//! Rewrites terminal-specific "soft newline" key encodings into one canonical
//! marker before the bytes reach the line editor.
//!
//! Terminals disagree on what Shift+Enter / Alt+Enter send. The three
//! encodings below are the ones seen in practice; each is replaced by
//! [`CONTINUATION_MARKER`], a backslash followed by a carriage return. The
//! line editor then sees a line ending in `\` being submitted, which the
//! continuation accumulator treats as "keep going".

use aho_corasick::{AhoCorasick, BuildError, MatchKind};

/// Backslash + carriage return.
pub const CONTINUATION_MARKER: &[u8] = b"\\\r";

/// Known soft-newline encodings.
pub const SOFT_NEWLINE_SEQUENCES: [&[u8]; 3] = [
    // Alt+Enter, and Shift+Enter in terminals that map it to Meta.
    b"\x1b\r",
    // CSI-u (kitty keyboard protocol) Shift+Enter.
    b"\x1b[13;2u",
    // xterm modifyOtherKeys Shift+Enter.
    b"\x1b[27;2;13~",
];

pub struct EscapeNormalizer {
    matcher: AhoCorasick,
}

impl EscapeNormalizer {
    pub fn new() -> Result<Self, BuildError> {
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(SOFT_NEWLINE_SEQUENCES)?;
        Ok(Self { matcher })
    }

    /// Replace every known sequence in `input` with the canonical marker.
    /// All other bytes, including unrelated escape sequences, pass through.
    pub fn normalize(&self, input: &[u8]) -> Vec<u8> {
        if !self.matcher.is_match(input) {
            return input.to_vec();
        }
        let replacements = [CONTINUATION_MARKER; SOFT_NEWLINE_SEQUENCES.len()];
        self.matcher.replace_all_bytes(input, &replacements)
    }
}
