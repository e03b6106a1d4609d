//! Inline markdown styling for a single line of text.
//!
//! Passes run in a fixed order: code spans, then `***`/`___`, then `**`/`__`,
//! then `*`/`_`. Code spans are split out first so no later pass touches
//! their contents. Anything unmatched is left as literal text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::ui::terminal::style;

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("code span pattern is valid"));

static BOLD_ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*\*(.+?)\*\*\*|___(.+?)___").expect("bold-italic pattern is valid")
});

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("bold pattern is valid"));

static ITALIC_STAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("italic pattern is valid")
});

// `_` only counts as emphasis at word boundaries, so snake_case survives.
static ITALIC_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9_])_([^_\s](?:[^_]*[^_\s])?)_($|[^A-Za-z0-9_])")
        .expect("underscore italic pattern is valid")
});

/// Apply inline styling to `text`.
pub fn render_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in CODE_SPAN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&render_emphasis(&text[last..whole.start()]));
        out.push_str(&style::code_span(&caps[1]));
        last = whole.end();
    }
    out.push_str(&render_emphasis(&text[last..]));
    out
}

fn render_emphasis(text: &str) -> String {
    if !text.contains(['*', '_']) {
        return text.to_string();
    }
    let text = BOLD_ITALIC.replace_all(text, |caps: &Captures| {
        style::bold_italic(first_group(caps))
    });
    let text = BOLD.replace_all(&text, |caps: &Captures| style::bold(first_group(caps)));
    let text = ITALIC_STAR.replace_all(&text, |caps: &Captures| style::italic(&caps[1]));
    let text = ITALIC_UNDERSCORE.replace_all(&text, |caps: &Captures| {
        format!("{}{}{}", &caps[1], style::italic(&caps[2]), &caps[3])
    });
    text.into_owned()
}

/// Content of whichever alternative matched.
fn first_group<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}
