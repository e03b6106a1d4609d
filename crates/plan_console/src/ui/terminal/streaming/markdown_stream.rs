use crossterm::style::Color;

use super::blocks::{self, LineKind, BULLET, CHECKLIST, HEADING, NUMBERED, QUOTE};
use super::inline::render_inline;
use crate::ui::terminal::screen::{Screen, NEWLINE};
use crate::ui::terminal::style;

const RULE_WIDTH: usize = 40;
const CODE_INDENT: &str = "  ";

/// Heading colors by level; anything else uses the default.
const HEADING_COLORS: [Color; 6] = [
    Color::Magenta,
    Color::Cyan,
    Color::Blue,
    Color::Green,
    Color::Yellow,
    Color::DarkGrey,
];
const HEADING_DEFAULT: Color = Color::White;

/// Newline-gated markdown renderer. Incoming fragments are buffered until a
/// full line is available; each complete line is classified and written to
/// the screen as styled output.
pub struct MarkdownStreamRenderer {
    screen: Screen,
    buffer: String,
    in_fence: bool,
    fence_lang: String,
}

impl MarkdownStreamRenderer {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            buffer: String::new(),
            in_fence: false,
            fence_lang: String::new(),
        }
    }

    /// Append a fragment and render every line it completes.
    pub fn write(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            self.emit_line(&line);
        }
    }

    /// Render whatever partial line is still buffered.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        self.emit_line(&line);
    }

    /// Drop buffered text and fence state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_fence = false;
        self.fence_lang.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn in_fence(&self) -> bool {
        self.in_fence
    }

    pub fn fence_language(&self) -> &str {
        &self.fence_lang
    }

    fn emit_line(&mut self, line: &str) {
        let mut rendered = self.render_line(line);
        rendered.push_str(NEWLINE);
        self.screen.write_str(&rendered);
    }

    fn render_line(&mut self, line: &str) -> String {
        if self.in_fence && !blocks::is_fence_delimiter(line) {
            return format!(
                "{CODE_INDENT}{} {}",
                style::dim("│"),
                style::dim(line)
            );
        }

        match blocks::classify(line) {
            LineKind::FenceDelimiter => self.toggle_fence(line),
            LineKind::Empty => String::new(),
            LineKind::Whitespace => line.to_string(),
            LineKind::Rule => style::dim(&"─".repeat(RULE_WIDTH)),
            LineKind::Heading => render_heading(line),
            LineKind::Checklist => render_checklist(line),
            LineKind::Bullet => render_bullet(line),
            LineKind::Numbered => render_numbered(line),
            LineKind::Quote => render_quote(line),
            LineKind::Plain => render_inline(line),
        }
    }

    fn toggle_fence(&mut self, line: &str) -> String {
        if self.in_fence {
            self.in_fence = false;
            self.fence_lang.clear();
            return format!("{CODE_INDENT}{}", style::dim("└─"));
        }
        self.in_fence = true;
        self.fence_lang = blocks::fence_language(line);
        if self.fence_lang.is_empty() {
            format!("{CODE_INDENT}{}", style::dim("┌─"))
        } else {
            format!("{CODE_INDENT}{}", style::dim(&format!("┌─ {}", self.fence_lang)))
        }
    }
}

pub fn heading_color(level: usize) -> Color {
    level
        .checked_sub(1)
        .and_then(|index| HEADING_COLORS.get(index))
        .copied()
        .unwrap_or(HEADING_DEFAULT)
}

fn render_heading(line: &str) -> String {
    let Some(caps) = HEADING.captures(line) else {
        return render_inline(line);
    };
    let level = caps[1].len();
    style::bold_colored(&render_inline(&caps[2]), heading_color(level))
}

fn render_checklist(line: &str) -> String {
    let Some(caps) = CHECKLIST.captures(line) else {
        return render_inline(line);
    };
    let indent = &caps[1];
    let text = caps.get(3).map_or("", |m| m.as_str());
    if caps[2].eq_ignore_ascii_case("x") {
        format!(
            "{indent}{} {}",
            style::colored("☑", style::SUCCESS),
            style::dim(&render_inline(text))
        )
    } else {
        format!("{indent}{} {}", style::dim("☐"), render_inline(text))
    }
}

fn render_bullet(line: &str) -> String {
    let Some(caps) = BULLET.captures(line) else {
        return render_inline(line);
    };
    format!(
        "{}{} {}",
        &caps[1],
        style::colored("•", Color::Cyan),
        render_inline(&caps[2])
    )
}

fn render_numbered(line: &str) -> String {
    let Some(caps) = NUMBERED.captures(line) else {
        return render_inline(line);
    };
    format!(
        "{}{} {}",
        &caps[1],
        style::colored(&format!("{}.", &caps[2]), Color::Cyan),
        render_inline(&caps[3])
    )
}

fn render_quote(line: &str) -> String {
    let Some(caps) = QUOTE.captures(line) else {
        return render_inline(line);
    };
    format!("{} {}", style::dim("│"), style::italic(&render_inline(&caps[1])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::terminal::screen::Capture;
    use crate::ui::terminal::style::strip_ansi;

    fn renderer() -> (MarkdownStreamRenderer, Capture) {
        let (screen, capture) = Screen::capture(Some(80));
        (MarkdownStreamRenderer::new(screen), capture)
    }

    fn plain(capture: &Capture) -> String {
        strip_ansi(&capture.contents()).replace('\r', "")
    }

    const SAMPLE: &str = concat!(
        "# Plan\n\nSome **bold** and *italic* and `code`.\n\n",
        "- [ ] first\n- [x] second\n* bullet\n3. third\n",
        "> quoted _text_\n---\n",
        "```rust\nlet x = **y**;\n```\n",
        "trailing partial",
    );

    #[test]
    fn nothing_is_emitted_before_a_newline() {
        let (mut renderer, capture) = renderer();
        renderer.write("partial");
        assert!(capture.is_empty());
        assert!(renderer.has_pending());
        renderer.write(" line\n");
        assert_eq!(plain(&capture), "partial line\n");
    }

    #[test]
    fn chunk_boundaries_do_not_change_output() {
        let (mut whole, whole_capture) = renderer();
        whole.write(SAMPLE);
        whole.flush();

        for chunk_size in [1, 2, 3, 7, 16] {
            let (mut chunked, chunked_capture) = renderer();
            let chars: Vec<char> = SAMPLE.chars().collect();
            for piece in chars.chunks(chunk_size) {
                chunked.write(&piece.iter().collect::<String>());
            }
            chunked.flush();
            assert_eq!(
                plain(&chunked_capture),
                plain(&whole_capture),
                "chunk size {chunk_size}"
            );
        }
    }

    #[test]
    fn bold_italic_markers_are_stripped() {
        let (mut renderer, capture) = renderer();
        renderer.write("***bold italic***\n");
        let out = plain(&capture);
        assert!(out.contains("bold italic"));
        assert!(!out.contains('*'));
    }

    #[test]
    fn fenced_lines_keep_their_markers() {
        let (mut renderer, capture) = renderer();
        renderer.write("```\n**bold**\n```\n**bold**\n");
        let out = plain(&capture);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].contains("**bold**"), "{lines:?}");
        assert_eq!(lines[3], "bold");
        assert!(!renderer.in_fence());
    }

    #[test]
    fn fence_tracks_language_label() {
        let (mut renderer, capture) = renderer();
        renderer.write("```python\n");
        assert!(renderer.in_fence());
        assert_eq!(renderer.fence_language(), "python");
        assert!(plain(&capture).contains("┌─ python"));
        renderer.write("# not a heading\n```\n");
        assert!(plain(&capture).contains("# not a heading"));
        assert_eq!(renderer.fence_language(), "");
    }

    #[test]
    fn flush_emits_partial_exactly_once() {
        let (mut renderer, capture) = renderer();
        renderer.write("tail **end**");
        renderer.flush();
        assert_eq!(plain(&capture), "tail end\n");
        let len = capture.len();
        renderer.flush();
        assert_eq!(capture.len(), len);
    }

    #[test]
    fn reset_clears_fence_state() {
        let (mut renderer, capture) = renderer();
        renderer.write("```\n");
        renderer.write("pending");
        renderer.reset();
        capture.clear();
        renderer.write("**bold**\n");
        assert_eq!(plain(&capture), "bold\n");
        assert!(!renderer.has_pending());
    }

    #[test]
    fn block_kinds_render_expected_text() {
        let (mut renderer, capture) = renderer();
        renderer.write(
            "## Heading\n- [ ] open\n- [x] closed\n- bullet\n7. seventh\n> said\n   \n\n***\n",
        );
        let out = plain(&capture);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Heading");
        assert_eq!(lines[1], "☐ open");
        assert_eq!(lines[2], "☑ closed");
        assert_eq!(lines[3], "• bullet");
        assert_eq!(lines[4], "7. seventh");
        assert_eq!(lines[5], "│ said");
        assert_eq!(lines[6], "   ");
        assert_eq!(lines[7], "");
        assert_eq!(lines[8], "─".repeat(RULE_WIDTH));
    }

    #[test]
    fn crlf_input_lines_are_trimmed() {
        let (mut renderer, capture) = renderer();
        renderer.write("one\r\ntwo\r\n");
        assert_eq!(plain(&capture), "one\ntwo\n");
    }

    #[test]
    fn heading_levels_map_to_colors() {
        assert_eq!(heading_color(1), Color::Magenta);
        assert_eq!(heading_color(6), Color::DarkGrey);
        assert_eq!(heading_color(0), HEADING_DEFAULT);
        assert_eq!(heading_color(9), HEADING_DEFAULT);
    }
}
