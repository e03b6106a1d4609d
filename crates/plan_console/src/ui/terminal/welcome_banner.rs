use crossterm::style::Color;

use super::style;

const ACCENT: Color = Color::Rgb {
    r: 100,
    g: 140,
    b: 255,
};
const INDENT: &str = "   ";

/// 6-row bitmap for each letter in "plan". '#' = filled pixel.
fn letter_bitmap(ch: char) -> &'static [&'static str; 6] {
    match ch {
        'p' => &["#### ", "#   #", "#   #", "#### ", "#    ", "#    "],
        'l' => &["#    ", "#    ", "#    ", "#    ", "#    ", "#####"],
        'a' => &[" ### ", "#   #", "#   #", "#####", "#   #", "#   #"],
        'n' => &["#   #", "##  #", "# # #", "#  ##", "#   #", "#   #"],
        _ => &["     ", "     ", "     ", "     ", "     ", "     "],
    }
}

/// Render "plan" with half-block characters: each terminal row packs two
/// bitmap rows, so the 6-row font prints in 3 lines.
fn render_banner() -> Vec<String> {
    let letters: Vec<&[&str; 6]> = "plan".chars().map(letter_bitmap).collect();
    (0..3)
        .map(|row| {
            letters
                .iter()
                .map(|letter| {
                    let top = letter[row * 2].chars();
                    let bottom = letter[row * 2 + 1].chars();
                    top.zip(bottom)
                        .map(|pair| match pair {
                            ('#', '#') => '█',
                            ('#', _) => '▀',
                            (_, '#') => '▄',
                            _ => ' ',
                        })
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Styled lines printed once at startup.
pub fn welcome_banner_lines(provider: &str) -> Vec<String> {
    let mut lines = vec![String::new()];
    for row in render_banner() {
        lines.push(format!("{INDENT}{}", style::colored(&row, ACCENT)));
    }
    lines.push(format!("{INDENT}{}", style::dim("c o n s o l e")));
    lines.push(String::new());
    lines.push(format!(
        "{INDENT}{} {}",
        style::dim("provider"),
        style::bold(provider)
    ));
    lines.push(format!(
        "{INDENT}{}",
        style::dim("Enter sends · end a line with \\ to continue · Ctrl-C cancels or quits")
    ));
    lines.push(String::new());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::terminal::style::strip_ansi;

    #[test]
    fn banner_structure() {
        let lines = welcome_banner_lines("demo");
        // blank + 3 banner + subtitle + blank + provider + hints + blank
        assert_eq!(lines.len(), 9);
        assert!(strip_ansi(&lines[6]).contains("provider demo"));
    }

    #[test]
    fn banner_rows_have_equal_width() {
        let rows = render_banner();
        let widths: Vec<usize> = rows.iter().map(|r| r.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{widths:?}");
        // four 5-column letters plus three separators
        assert_eq!(widths[0], 23);
    }

    #[test]
    fn half_blocks_pack_two_rows() {
        // 'l' is a bare column until its last row, which is solid.
        let rows = render_banner();
        let l_start = 6;
        assert_eq!(rows[0].chars().nth(l_start), Some('█'));
        assert_eq!(rows[2].chars().skip(l_start).take(5).collect::<String>(), "█▄▄▄▄");
    }
}
