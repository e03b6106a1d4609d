// Line classification for streamed markdown.
//
// The cascade is an ordered list of (kind, predicate) pairs and the first
// match wins. Order matters: fence delimiters must be seen before anything
// else, and checklist items before plain bullets.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    FenceDelimiter,
    Empty,
    Whitespace,
    Rule,
    Heading,
    Checklist,
    Bullet,
    Numbered,
    Quote,
    Plain,
}

static RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("rule pattern is valid")
});

pub static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*)$").expect("heading pattern is valid"));

pub static CHECKLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)[-*] \[([ xX])\](?:[ \t]+(.*))?$").expect("checklist pattern is valid")
});

pub static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)[-*+] (.*)$").expect("bullet pattern is valid"));

pub static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(\d+)\. (.*)$").expect("numbered pattern is valid"));

pub static QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*> ?(.*)$").expect("quote pattern is valid"));

type Predicate = fn(&str) -> bool;

static CASCADE: &[(LineKind, Predicate)] = &[
    (LineKind::FenceDelimiter, is_fence_delimiter),
    (LineKind::Empty, str::is_empty),
    (LineKind::Whitespace, is_whitespace_only),
    (LineKind::Rule, is_rule),
    (LineKind::Heading, is_heading),
    (LineKind::Checklist, is_checklist),
    (LineKind::Bullet, is_bullet),
    (LineKind::Numbered, is_numbered),
    (LineKind::Quote, is_quote),
];

pub fn classify(line: &str) -> LineKind {
    CASCADE
        .iter()
        .find(|(_, matches)| matches(line))
        .map_or(LineKind::Plain, |(kind, _)| *kind)
}

pub fn is_fence_delimiter(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn is_whitespace_only(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_rule(line: &str) -> bool {
    RULE.is_match(line)
}

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

fn is_checklist(line: &str) -> bool {
    CHECKLIST.is_match(line)
}

fn is_bullet(line: &str) -> bool {
    BULLET.is_match(line)
}

fn is_numbered(line: &str) -> bool {
    NUMBERED.is_match(line)
}

fn is_quote(line: &str) -> bool {
    QUOTE.is_match(line)
}

/// Language label on an opening fence (` ```rust ` → `rust`).
pub fn fence_language(line: &str) -> String {
    line.trim()
        .trim_start_matches(['`', '~'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let cases = [
            ("```rust", LineKind::FenceDelimiter),
            ("~~~", LineKind::FenceDelimiter),
            ("", LineKind::Empty),
            ("   ", LineKind::Whitespace),
            ("---", LineKind::Rule),
            ("* * *", LineKind::Rule),
            ("___", LineKind::Rule),
            ("# Title", LineKind::Heading),
            ("###### Deep", LineKind::Heading),
            ("- [ ] todo", LineKind::Checklist),
            ("- [x] done", LineKind::Checklist),
            ("- [X] done", LineKind::Checklist),
            ("- item", LineKind::Bullet),
            ("* item", LineKind::Bullet),
            ("  - nested", LineKind::Bullet),
            ("12. step", LineKind::Numbered),
            ("> quoted", LineKind::Quote),
            ("just text", LineKind::Plain),
        ];
        for (line, expected) in cases {
            assert_eq!(classify(line), expected, "line {line:?}");
        }
    }

    #[test]
    fn near_misses_fall_through_to_plain() {
        assert_eq!(classify("#nospace"), LineKind::Plain);
        assert_eq!(classify("####### seven"), LineKind::Plain);
        assert_eq!(classify("--"), LineKind::Plain);
        assert_eq!(classify("-item"), LineKind::Plain);
        assert_eq!(classify("1.no space"), LineKind::Plain);
    }

    #[test]
    fn rule_wins_over_bullet() {
        assert_eq!(classify("- - -"), LineKind::Rule);
    }

    #[test]
    fn fence_language_is_extracted() {
        assert_eq!(fence_language("```python"), "python");
        assert_eq!(fence_language("  ``` "), "");
    }
}
