// src/core/snippet.rs

use colored::Colorize;

/// Lines of context shown above and below the offending line.
const CONTEXT_LINES: usize = 2;

/// Renders the lines around `line` (1-based) with line numbers, marking the
/// offending one. Used to point at header errors.
pub fn render(content: &str, line: usize) -> String {
    let first = line.saturating_sub(CONTEXT_LINES).max(1);
    let last = line + CONTEXT_LINES;

    content
        .lines()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .filter(|(number, _)| (first..=last).contains(number))
        .map(|(number, text)| {
            if number == line {
                format!("{} {:>4} | {}", ">".red().bold(), number, text)
            } else {
                format!("  {:>4} | {}", number.to_string().dimmed(), text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefixes every line of `content` with its 1-based number.
pub fn numbered(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(i, text)| format!("{:>4} | {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_line_with_context() {
        colored::control::set_override(false);
        let content = "a\nb\nc\nd\ne\nf";
        let out = render(content, 4);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("2 | b"));
        assert!(lines[2].starts_with('>'));
        assert!(lines[2].contains("4 | d"));
        assert!(lines[4].contains("6 | f"));
    }

    #[test]
    fn test_render_clamps_at_start() {
        colored::control::set_override(false);
        let out = render("first\nsecond", 1);
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with('>'));
    }

    #[test]
    fn test_numbered() {
        assert_eq!(numbered("x\ny"), "   1 | x\n   2 | y");
    }
}
