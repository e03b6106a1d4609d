// Write arbiter between the line editor and direct terminal output.
//
// The line editor redraws its prompt on every keystroke. While an indicator or
// the stream renderer owns the terminal those redraws would land in the middle
// of animated lines, so the editor writes through this gate and the gate is
// muted for as long as something else is drawing.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::screen::Screen;

/// Mute-able sink for the line editor. One instance per interactive session;
/// clones share the mute flag.
#[derive(Clone)]
pub struct OutputGate {
    screen: Screen,
    muted: Arc<AtomicBool>,
}

impl OutputGate {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            muted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mute(&self) {
        if !self.muted.swap(true, Ordering::SeqCst) {
            tracing::trace!("output gate muted");
        }
    }

    pub fn unmute(&self) {
        if self.muted.swap(false, Ordering::SeqCst) {
            tracing::trace!("output gate unmuted");
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}

impl Write for OutputGate {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Report muted writes as accepted so the editor never stalls on them.
        if self.is_muted() {
            return Ok(buf.len());
        }
        self.screen.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
