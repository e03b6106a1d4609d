// Terminal setup and teardown, plus the raw stdin reader.
//
// Output is a plain linear stream (no alternate screen), so setup is just raw
// mode. Teardown must run on every exit path, including panics.

use std::io::{self, stdout, Read};
use std::panic;
use std::sync::Once;
use std::thread;

use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use tokio::sync::mpsc;

const READ_CHUNK: usize = 1024;

static PANIC_HOOK: Once = Once::new();

/// Put the terminal into raw mode.
pub fn init() -> io::Result<()> {
    set_panic_hook();
    enable_raw_mode()?;
    tracing::debug!("terminal raw mode enabled");
    Ok(())
}

/// Restore terminal state. Safe to call more than once.
pub fn restore() -> io::Result<()> {
    if is_raw_mode_enabled()? {
        disable_raw_mode()?;
    }
    execute!(stdout(), Show)?;
    Ok(())
}

fn set_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = restore();
            hook(panic_info);
        }));
    });
}

/// Forward raw stdin chunks to an async channel from a dedicated thread.
///
/// The channel closes when stdin reaches EOF or fails. The thread itself exits
/// the next time it reads after the receiver is dropped.
pub fn spawn_input_reader() -> io::Result<mpsc::UnboundedReceiver<Vec<u8>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        tracing::warn!("stdin read failed: {err}");
                        break;
                    }
                }
            }
            tracing::debug!("stdin reader stopped");
        })?;
    Ok(rx)
}
