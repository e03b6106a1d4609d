// Shared handle over the terminal output stream.
//
// Every component that writes directly to the terminal (indicators, the
// markdown renderer, the selection menu) holds a clone of the same `Screen`.
// The line editor is the exception: it writes through the `OutputGate`, which
// in turn forwards to a `Screen` while unmuted.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crossterm::cursor::{Hide, MoveToColumn, MoveUp, Show};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use super::style::strip_ansi;

/// Line terminator used for all output. The terminal runs in raw mode, so a
/// bare `\n` would not return the cursor to column 0.
pub const NEWLINE: &str = "\r\n";

/// Width assumed when the terminal cannot report its size.
pub const DEFAULT_WIDTH: u16 = 120;

type Sink = Box<dyn Write + Send>;

#[derive(Clone, Copy, Debug)]
enum WidthSource {
    Terminal,
    Fixed(Option<u16>),
}

/// Cloneable writer over the terminal (or an in-memory capture in tests).
#[derive(Clone)]
pub struct Screen {
    sink: Arc<Mutex<Sink>>,
    width: WidthSource,
}

impl Screen {
    /// Screen backed by the process's standard output.
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(io::stdout()))),
            width: WidthSource::Terminal,
        }
    }

    /// In-memory screen with a fixed (or unknown) width. Returns the screen and
    /// a handle for reading back everything written to it.
    pub fn capture(width: Option<u16>) -> (Self, Capture) {
        let capture = Capture::default();
        let screen = Self {
            sink: Arc::new(Mutex::new(Box::new(capture.clone()))),
            width: WidthSource::Fixed(width),
        };
        (screen, capture)
    }

    /// Terminal width in columns, if known.
    pub fn width(&self) -> Option<u16> {
        match self.width {
            WidthSource::Terminal => crossterm::terminal::size()
                .ok()
                .map(|(cols, _)| cols)
                .filter(|cols| *cols > 0),
            WidthSource::Fixed(width) => width,
        }
    }

    /// Width in columns, falling back to [`DEFAULT_WIDTH`].
    pub fn width_or_default(&self) -> u16 {
        self.width().unwrap_or(DEFAULT_WIDTH)
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut sink = self.lock();
        sink.write_all(bytes)?;
        sink.flush()
    }

    /// Write a string, logging (not propagating) failures. Rendering never
    /// takes the session down.
    pub fn write_str(&self, text: &str) {
        if let Err(err) = self.write_bytes(text.as_bytes()) {
            tracing::warn!("terminal write failed: {err}");
        }
    }

    pub fn newline(&self) {
        self.write_str(NEWLINE);
    }

    /// Return to column 0 and clear the current line.
    pub fn clear_line(&self) {
        self.write_control(|buf| queue!(buf, MoveToColumn(0), Clear(ClearType::CurrentLine)));
    }

    /// Clear the current line and write `text` in its place (no newline).
    pub fn replace_line(&self, text: &str) {
        let mut buf = clear_line_sequence();
        buf.extend_from_slice(text.as_bytes());
        if let Err(err) = self.write_bytes(&buf) {
            tracing::warn!("terminal write failed: {err}");
        }
    }

    /// Clear from the cursor to the end of the screen.
    pub fn clear_below(&self) {
        self.write_control(|buf| queue!(buf, Clear(ClearType::FromCursorDown)));
    }

    pub fn move_up(&self, rows: u16) {
        if rows == 0 {
            return;
        }
        self.write_control(|buf| queue!(buf, MoveUp(rows)));
    }

    pub fn hide_cursor(&self) {
        self.write_control(|buf| queue!(buf, Hide));
    }

    pub fn show_cursor(&self) {
        self.write_control(|buf| queue!(buf, Show));
    }

    fn write_control(&self, build: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) {
        let mut buf = Vec::new();
        match build(&mut buf) {
            Ok(()) => self.write_str_bytes(&buf),
            Err(err) => tracing::warn!("failed to encode terminal command: {err}"),
        }
    }

    fn write_str_bytes(&self, bytes: &[u8]) {
        if let Err(err) = self.write_bytes(bytes) {
            tracing::warn!("terminal write failed: {err}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bytes that return the cursor to column 0 and clear the line.
pub fn clear_line_sequence() -> Vec<u8> {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = queue!(buf, MoveToColumn(0), Clear(ClearType::CurrentLine));
    buf
}

/// Read-back handle for a captured [`Screen`].
#[derive(Clone, Default)]
pub struct Capture {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.guard()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Final visible text of each output row. Redraws on a row always start
    /// with a line clear, so only what follows the last clear survives.
    pub fn visible_lines(&self) -> Vec<String> {
        let contents = self.contents();
        let clear = String::from_utf8_lossy(&clear_line_sequence()).into_owned();
        contents
            .split(NEWLINE)
            .map(|row| {
                let tail = row.rfind(&clear).map_or(row, |at| &row[at + clear.len()..]);
                strip_ansi(tail)
            })
            .collect()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_writes_from_all_clones() {
        let (screen, capture) = Screen::capture(Some(40));
        let other = screen.clone();
        screen.write_str("a");
        other.write_str("b");
        assert_eq!(capture.contents(), "ab");
        assert_eq!(screen.width(), Some(40));
    }

    #[test]
    fn unknown_width_falls_back_to_default() {
        let (screen, _capture) = Screen::capture(None);
        assert_eq!(screen.width(), None);
        assert_eq!(screen.width_or_default(), DEFAULT_WIDTH);
    }

    #[test]
    fn visible_lines_keep_last_redraw_per_row() {
        let (screen, capture) = Screen::capture(None);
        screen.replace_line("frame 1");
        screen.replace_line("frame 2");
        screen.newline();
        screen.write_str("next");
        assert_eq!(capture.visible_lines(), vec!["frame 2", "next"]);
    }

    #[test]
    fn move_up_by_zero_writes_nothing() {
        let (screen, capture) = Screen::capture(None);
        screen.move_up(0);
        assert!(capture.is_empty());
        screen.move_up(2);
        assert_eq!(capture.contents(), "\x1b[2A");
    }
}
