// Animated progress indicators.
//
// Indicators write straight to the `Screen`, never through the output gate.
// They do not own a timer: the stream controller ticks whichever indicator is
// active at that indicator's frame interval.

use std::time::Duration;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::screen::Screen;
use super::style;
use crate::ui::ToolStatus;

/// Frame table shared by both indicator variants.
#[derive(Debug, Clone, Copy)]
pub struct Frames {
    pub glyphs: &'static [&'static str],
    pub interval: Duration,
}

pub const THINKING_FRAMES: Frames = Frames {
    glyphs: &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
    interval: Duration::from_millis(80),
};

pub const TOOL_FRAMES: Frames = Frames {
    glyphs: &["◐", "◓", "◑", "◒"],
    interval: Duration::from_millis(120),
};

const THINKING_LABEL: &str = "Thinking…";
const INDENT: &str = "  ";
const TOOL_ICON: &str = "▸";
const SUCCESS_GLYPH: &str = "✓";
const FAILURE_GLYPH: &str = "✗";

/// The argument summary is never squeezed below this many columns.
pub const MIN_ARGS_WIDTH: usize = 20;
/// Tool names are cut to fit, but keep at least this many columns.
pub const MIN_NAME_WIDTH: usize = 8;

#[derive(Debug)]
struct IndicatorState {
    frames: Frames,
    index: usize,
    running: bool,
    /// One-way latch: a stopped indicator never runs again.
    stopped: bool,
}

impl IndicatorState {
    fn new(frames: Frames) -> Self {
        Self {
            frames,
            index: 0,
            running: false,
            stopped: false,
        }
    }

    fn glyph(&self) -> &'static str {
        self.frames.glyphs[self.index % self.frames.glyphs.len().max(1)]
    }

    fn advance(&mut self) {
        self.index = (self.index + 1) % self.frames.glyphs.len().max(1);
    }
}

/// Generic "thinking" spinner. Clears its line entirely when stopped.
pub struct ThinkingIndicator {
    screen: Screen,
    state: IndicatorState,
}

impl ThinkingIndicator {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            state: IndicatorState::new(THINKING_FRAMES),
        }
    }

    pub fn start(&mut self) {
        if self.state.running || self.state.stopped {
            return;
        }
        self.state.running = true;
        self.screen.hide_cursor();
        self.draw();
    }

    pub fn tick(&mut self) {
        if !self.state.running {
            return;
        }
        self.state.advance();
        self.draw();
    }

    pub fn stop(&mut self) {
        if self.state.stopped {
            return;
        }
        let was_running = self.state.running;
        self.state.running = false;
        self.state.stopped = true;
        if was_running {
            self.screen.clear_line();
            self.screen.show_cursor();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn interval(&self) -> Duration {
        self.state.frames.interval
    }

    fn draw(&self) {
        let line = format!(
            "{}{} {}",
            INDENT,
            style::colored(self.state.glyph(), style::RUNNING),
            style::dim(THINKING_LABEL)
        );
        self.screen.replace_line(&line);
    }
}

/// Indicator scoped to one tool invocation. Ends as a persistent line with a
/// success or failure glyph.
pub struct ToolCallIndicator {
    screen: Screen,
    state: IndicatorState,
    name: String,
    args: String,
}

impl ToolCallIndicator {
    /// Create the indicator and draw its first frame immediately.
    pub fn start(screen: Screen, name: &str, args_summary: &str) -> Self {
        let mut indicator = Self {
            screen,
            state: IndicatorState::new(TOOL_FRAMES),
            name: name.to_string(),
            args: args_summary.to_string(),
        };
        indicator.state.running = true;
        indicator.screen.hide_cursor();
        indicator.draw(ToolStatus::Running);
        indicator
    }

    pub fn tick(&mut self) {
        if !self.state.running {
            return;
        }
        self.state.advance();
        self.draw(ToolStatus::Running);
    }

    /// Replace the animated line with its final state.
    pub fn stop(&mut self, success: bool) {
        if self.state.stopped {
            return;
        }
        self.state.running = false;
        self.state.stopped = true;
        let status = if success {
            ToolStatus::Success
        } else {
            ToolStatus::Error
        };
        self.draw(status);
        self.screen.newline();
        self.screen.show_cursor();
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn interval(&self) -> Duration {
        self.state.frames.interval
    }

    fn draw(&self, status: ToolStatus) {
        let line = render_tool_line(
            &self.name,
            &self.args,
            status,
            self.state.glyph(),
            self.screen.width_or_default(),
        );
        self.screen.replace_line(&line);
    }
}

/// Styled `  ▸ name args glyph` line. The name is cut so the minimum argument
/// summary still fits, then `args` gets the width left over.
pub fn render_tool_line(
    name: &str,
    args: &str,
    status: ToolStatus,
    running_glyph: &str,
    width: u16,
) -> String {
    let (glyph, color) = match status {
        ToolStatus::Running => (running_glyph, style::RUNNING),
        ToolStatus::Success => (SUCCESS_GLYPH, style::SUCCESS),
        ToolStatus::Error => (FAILURE_GLYPH, style::FAILURE),
    };
    let name = truncate_to_width(name, name_budget(width, !args.is_empty()));
    let args = truncate_to_width(args, args_budget(&name, width));

    let mut line = format!(
        "{INDENT}{} {}",
        style::colored(TOOL_ICON, color),
        style::bold_colored(&name, style::LABEL)
    );
    if !args.is_empty() {
        line.push(' ');
        line.push_str(&style::dim(&args));
    }
    line.push(' ');
    line.push_str(&style::colored(glyph, color));
    line
}

/// Columns available for the tool name at `width`.
pub fn name_budget(width: u16, has_args: bool) -> usize {
    // indent + icon + space + [name] + space + glyph
    let mut reserved = INDENT.width() + TOOL_ICON.width() + 1 + 1 + 1;
    if has_args {
        reserved += 1 + MIN_ARGS_WIDTH;
    }
    (width as usize).saturating_sub(reserved).max(MIN_NAME_WIDTH)
}

/// Columns available for the argument summary at `width`.
pub fn args_budget(name: &str, width: u16) -> usize {
    // indent + icon + space + name + space + [args] + space + glyph
    let fixed = INDENT.width() + TOOL_ICON.width() + 1 + name.width() + 1 + 1 + 1;
    (width as usize).saturating_sub(fixed).max(MIN_ARGS_WIDTH)
}

/// Truncate `text` to at most `max` display columns, ending in `…` when cut.
/// Newlines are flattened to spaces first.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.width() <= max {
        return flat;
    }
    let budget = max.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for ch in flat.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}
