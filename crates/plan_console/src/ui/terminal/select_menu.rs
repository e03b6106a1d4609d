// Inline single-choice menu driven by raw keystrokes.
//
// The menu takes over the input channel for its lifetime and draws straight
// to the screen, so the output gate stays muted until it returns.

use tokio::sync::mpsc::UnboundedReceiver;

use super::keys::{Key, KeyDecoder};
use super::output_gate::OutputGate;
use super::screen::Screen;
use super::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Selected(usize),
    /// `q`, Esc, Ctrl-D or closed input.
    Dismissed,
    /// Ctrl-C.
    Interrupted,
}

pub struct SelectMenu {
    title: String,
    items: Vec<String>,
    cursor: usize,
    drawn_rows: u16,
}

impl SelectMenu {
    pub fn new(title: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            title: title.into(),
            items,
            cursor: 0,
            drawn_rows: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Apply one key. Returns the outcome once the menu is finished.
    pub fn handle_key(&mut self, key: &Key) -> Option<MenuOutcome> {
        match key {
            Key::Up | Key::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            Key::Down | Key::Char('j') => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
                None
            }
            Key::Enter if !self.items.is_empty() => Some(MenuOutcome::Selected(self.cursor)),
            Key::Char('q') | Key::Esc | Key::Eof => Some(MenuOutcome::Dismissed),
            Key::Interrupt => Some(MenuOutcome::Interrupted),
            _ => None,
        }
    }

    /// Draw the menu, overwriting the previous frame in place.
    pub fn render(&mut self, screen: &Screen) {
        screen.move_up(self.drawn_rows);
        screen.replace_line(&style::bold(&self.title));
        screen.newline();
        for (index, item) in self.items.iter().enumerate() {
            let line = if index == self.cursor {
                format!("{} {}", style::colored("❯", style::RUNNING), style::bold(item))
            } else {
                format!("  {}", style::dim(item))
            };
            screen.replace_line(&line);
            screen.newline();
        }
        self.drawn_rows = (self.items.len() + 1).min(u16::MAX as usize) as u16;
    }

    /// Replace the menu with a one-line summary of the outcome.
    fn collapse(&mut self, screen: &Screen, outcome: MenuOutcome) {
        screen.move_up(self.drawn_rows);
        screen.clear_below();
        let summary = match outcome {
            MenuOutcome::Selected(index) => format!(
                "{} {}",
                style::dim(&format!("{}:", self.title)),
                style::colored(&self.items[index], style::SUCCESS)
            ),
            MenuOutcome::Dismissed | MenuOutcome::Interrupted => {
                style::dim(&format!("{}: (none)", self.title))
            }
        };
        screen.replace_line(&summary);
        screen.newline();
        self.drawn_rows = 0;
    }

    /// Run the menu against raw input until the user chooses or leaves.
    pub async fn run(
        mut self,
        screen: &Screen,
        gate: &OutputGate,
        input: &mut UnboundedReceiver<Vec<u8>>,
    ) -> MenuOutcome {
        gate.mute();
        screen.hide_cursor();
        self.render(screen);

        let mut decoder = KeyDecoder::new();
        let outcome = 'read: loop {
            let Some(bytes) = input.recv().await else {
                break MenuOutcome::Dismissed;
            };
            let mut moved = false;
            for key in decoder.feed(&bytes) {
                if let Some(outcome) = self.handle_key(&key) {
                    break 'read outcome;
                }
                moved = true;
            }
            if moved {
                self.render(screen);
            }
        };

        self.collapse(screen, outcome);
        screen.show_cursor();
        gate.unmute();
        tracing::debug!(?outcome, "selection menu closed");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn items() -> Vec<String> {
        vec!["alpha".into(), "beta".into(), "gamma".into()]
    }

    #[test]
    fn navigation_clamps_at_edges() {
        let mut menu = SelectMenu::new("Pick", items());
        assert_eq!(menu.handle_key(&Key::Up), None);
        assert_eq!(menu.cursor(), 0);
        menu.handle_key(&Key::Char('j'));
        menu.handle_key(&Key::Down);
        menu.handle_key(&Key::Down);
        assert_eq!(menu.cursor(), 2);
        menu.handle_key(&Key::Char('k'));
        assert_eq!(menu.handle_key(&Key::Enter), Some(MenuOutcome::Selected(1)));
    }

    #[test]
    fn exit_keys() {
        let mut menu = SelectMenu::new("Pick", items());
        assert_eq!(menu.handle_key(&Key::Char('q')), Some(MenuOutcome::Dismissed));
        assert_eq!(menu.handle_key(&Key::Esc), Some(MenuOutcome::Dismissed));
        assert_eq!(menu.handle_key(&Key::Interrupt), Some(MenuOutcome::Interrupted));
        let mut empty = SelectMenu::new("Pick", Vec::new());
        assert_eq!(empty.handle_key(&Key::Enter), None);
    }

    #[test]
    fn rerender_moves_up_over_previous_frame() {
        let (screen, capture) = Screen::capture(Some(40));
        let mut menu = SelectMenu::new("Pick", items());
        menu.render(&screen);
        assert!(!capture.contents().contains("\x1b[4A"));
        menu.render(&screen);
        assert!(capture.contents().contains("\x1b[4A"));
    }

    #[tokio::test]
    async fn run_selects_with_arrow_keys_and_restores_gate() {
        let (screen, capture) = Screen::capture(Some(40));
        let gate = OutputGate::new(screen.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(b"\x1b[B".to_vec()).unwrap();
        tx.send(b"\r".to_vec()).unwrap();

        let outcome = SelectMenu::new("Provider", items())
            .run(&screen, &gate, &mut rx)
            .await;
        assert_eq!(outcome, MenuOutcome::Selected(1));
        assert!(!gate.is_muted());
        assert_eq!(
            capture.visible_lines().iter().rev().nth(1).map(String::as_str),
            Some("Provider: beta")
        );
    }

    #[tokio::test]
    async fn closed_input_dismisses() {
        let (screen, _capture) = Screen::capture(Some(40));
        let gate = OutputGate::new(screen.clone());
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        drop(tx);
        let outcome = SelectMenu::new("Provider", items())
            .run(&screen, &gate, &mut rx)
            .await;
        assert_eq!(outcome, MenuOutcome::Dismissed);
    }
}
