use std::io::Write;

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::keys::{Key, KeyDecoder};
use super::screen::NEWLINE;

pub const PROMPT: &str = "› ";
pub const CONTINUATION_PROMPT: &str = "… ";

/// What the editor reports back after consuming input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Submit(String),
    Interrupt,
    Eof,
}

/// Single-line editor. All of its output goes to `out`, which in the running
/// app is the `OutputGate`.
pub struct LineEditor<W: Write> {
    out: W,
    decoder: KeyDecoder,
    buffer: Vec<char>,
    cursor: usize,
    prompt: String,
}

impl<W: Write> LineEditor<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            decoder: KeyDecoder::new(),
            buffer: Vec::new(),
            cursor: 0,
            prompt: PROMPT.to_string(),
        }
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    /// Current (unsubmitted) buffer contents.
    pub fn buffer(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Consume raw (already normalized) input bytes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        let mut dirty = false;
        for key in self.decoder.feed(bytes) {
            match key {
                Key::Enter => {
                    // Echo keys that arrived in the same chunk before moving on.
                    if dirty {
                        self.redraw();
                        dirty = false;
                    }
                    let line = self.buffer();
                    self.clear();
                    self.emit(NEWLINE);
                    events.push(EditorEvent::Submit(line));
                }
                Key::Interrupt => {
                    events.push(EditorEvent::Interrupt);
                }
                Key::Eof => {
                    if self.buffer.is_empty() {
                        events.push(EditorEvent::Eof);
                    }
                }
                key => dirty |= self.apply(key),
            }
        }
        if dirty {
            self.redraw();
        }
        events
    }

    /// Redraw prompt and buffer on the current line.
    pub fn redraw(&mut self) {
        let text = self.buffer();
        let before_cursor: String = self.buffer[..self.cursor].iter().collect();
        let column = UnicodeWidthStr::width(self.prompt.as_str()) + before_cursor.width();

        let mut frame = Vec::new();
        let encoded = queue!(frame, MoveToColumn(0), Clear(ClearType::CurrentLine));
        frame.extend_from_slice(self.prompt.as_bytes());
        frame.extend_from_slice(text.as_bytes());
        let encoded = encoded.and_then(|()| {
            queue!(
                frame,
                MoveToColumn(column.min(u16::MAX as usize) as u16)
            )
        });
        if let Err(err) = encoded {
            tracing::warn!("failed to encode prompt redraw: {err}");
            return;
        }
        self.emit_bytes(&frame);
    }

    fn apply(&mut self, key: Key) -> bool {
        match key {
            Key::Char(ch) => {
                if ch.width().unwrap_or(0) == 0 && !ch.is_whitespace() {
                    return false;
                }
                self.buffer.insert(self.cursor, ch);
                self.cursor += 1;
            }
            Key::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            Key::Delete => {
                if self.cursor >= self.buffer.len() {
                    return false;
                }
                self.buffer.remove(self.cursor);
            }
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            Key::Home => self.cursor = 0,
            Key::End => self.cursor = self.buffer.len(),
            Key::KillLine => self.clear(),
            Key::Up | Key::Down | Key::Esc | Key::Unknown(_) => return false,
            Key::Enter | Key::Interrupt | Key::Eof => return false,
        }
        true
    }

    fn emit(&mut self, text: &str) {
        self.emit_bytes(text.as_bytes());
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        if let Err(err) = self.out.write_all(bytes).and_then(|()| self.out.flush()) {
            tracing::warn!("line editor write failed: {err}");
        }
    }
}
