//! Word wrapping of styled text
//!
//! Lines are broken at embedded newlines first, then at spaces, then
//! at the first alphanumeric after a run of punctuation, and only
//! split mid-word when nothing else fits.  Whitespace separates words
//! rather than positioning them, so spaces at either end of a wrapped
//! line are dropped.

use crate::frame::{Attr, Cell};

fn is_space(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn is_break_punctuation(ch: char) -> bool {
    matches!(
        ch,
        '-' | '+' | ';' | '~' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'
    )
}

// Positions at which a line may be broken
fn wrap_points(text: &[Cell]) -> Vec<usize> {
    let mut points = Vec::new();
    let mut after_punct = false;
    for (i, cell) in text.iter().enumerate() {
        let ch = cell.ch;
        if is_space(ch) || ch == '\n' {
            after_punct = false;
            points.push(i);
        } else if is_break_punctuation(ch) {
            after_punct = true;
        } else if ch.is_alphanumeric() {
            if after_punct {
                points.push(i);
            }
            after_punct = false;
        }
    }
    points
}

/// Wrap cells into lines no longer than `width`.  Always returns at
/// least one line, which is empty for empty input.
pub fn wrap(cells: &[Cell], width: usize) -> Vec<Vec<Cell>> {
    let width = width.max(1);

    // CR LF and lone CR both become LF
    let mut text = Vec::with_capacity(cells.len());
    let mut iter = cells.iter().peekable();
    while let Some(cell) = iter.next() {
        if cell.ch == '\r' {
            if iter.peek().map_or(false, |next| next.ch == '\n') {
                continue;
            }
            text.push(Cell::new('\n', cell.attr));
        } else {
            text.push(*cell);
        }
    }
    if text.is_empty() {
        return vec![Vec::new()];
    }

    let points = wrap_points(&text);
    let mut lines = Vec::new();
    let mut start = 0;
    let mut first_point = 0;
    while start < text.len() {
        while first_point < points.len() && points[first_point] < start {
            first_point += 1;
        }
        let rest = &text[start..];
        let relevant: Vec<usize> = points[first_point..]
            .iter()
            .map(|p| p - start)
            .take_while(|&p| p <= width)
            .collect();

        if let Some(&pos) = relevant.iter().find(|&&p| rest[p].ch == '\n') {
            lines.push(rest[..pos].to_vec());
            start += pos + 1;
            continue;
        }

        // A break at 0 would make no progress
        match relevant.iter().rev().find(|&&p| p > 0) {
            Some(&pos) if rest.len() > width => {
                lines.push(rest[..pos].to_vec());
                if is_space(rest[pos].ch) {
                    match rest[pos..].iter().position(|c| !is_space(c.ch)) {
                        Some(skip) => start += pos + skip,
                        None => start = text.len(),
                    }
                } else {
                    start += pos;
                }
            }
            _ => {
                let count = width.min(rest.len());
                lines.push(rest[..count].to_vec());
                start += count;
            }
        }
    }

    lines.into_iter().map(trim).collect()
}

fn trim(mut line: Vec<Cell>) -> Vec<Cell> {
    while line.last().map_or(false, |c| is_space(c.ch)) {
        line.pop();
    }
    let lead = line.iter().take_while(|c| is_space(c.ch)).count();
    line.drain(..lead);
    line
}

/// Convert plain text to cells, dropping control characters other
/// than newlines, then wrap it
pub fn wrap_str(text: &str, attr: Attr, width: usize) -> Vec<Vec<Cell>> {
    let cells: Vec<Cell> = clean(text).chars().map(|ch| Cell::new(ch, attr)).collect();
    wrap(&cells, width)
}

/// Remove control characters that would upset the terminal.  Tabs
/// become spaces, and newlines are kept.
pub fn clean(text: &str) -> String {
    text.chars()
        .filter_map(|ch| match ch {
            '\n' | '\r' => Some(ch),
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Cut text to at most `width` characters, marking the cut with `~`
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('~');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str, width: usize, expect: &[&str]) {
        let lines: Vec<String> = wrap_str(text, Attr::empty(), width)
            .iter()
            .map(|line| line.iter().map(|c| c.ch).collect())
            .collect();
        assert_eq!(lines, expect, "wrapping {:?} at {}", text, width);
    }

    #[test]
    fn empty() {
        check("", 15, &[""]);
    }

    #[test]
    fn fits() {
        check("12345", 15, &["12345"]);
    }

    #[test]
    fn newlines() {
        check("123\n45", 15, &["123", "45"]);
        check("123\n\n45", 15, &["123", "", "45"]);
        check("123\r\n45\r6", 15, &["123", "45", "6"]);
    }

    #[test]
    fn wraps_at_spaces_and_punctuation() {
        check("123 4567 890", 10, &["123 4567", "890"]);
        check("123 4567 890", 4, &["123", "4567", "890"]);
        check("123-4567 890", 10, &["123-4567", "890"]);
        check("123 4567-890", 10, &["123 4567-", "890"]);
    }

    #[test]
    fn multiple_spaces() {
        check("123  4567  890", 9, &["123  4567", "890"]);
        check("123  4567  890", 10, &["123  4567", "890"]);
    }

    #[test]
    fn newlines_and_wraps_together() {
        check("123 4567\n890", 10, &["123 4567", "890"]);
        check("123\n4567 890", 10, &["123", "4567 890"]);
    }

    #[test]
    fn mid_word_when_forced() {
        check("abcdefg", 5, &["abcde", "fg"]);
        check("abcdefg hij kl", 6, &["abcdef", "g hij", "kl"]);
    }

    #[test]
    fn long_word_after_punctuation_makes_progress() {
        check("x-aaaaaaaaaaaa", 5, &["x-", "aaaaa", "aaaaa", "aa"]);
    }

    #[test]
    fn attributes_follow_characters() {
        let mut cells = crate::frame::styled("ab ", Attr::empty());
        cells.extend(crate::frame::styled("cd", Attr::BOLD));
        let lines = wrap(&cells, 3);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1][0], Cell::new('c', Attr::BOLD));
    }

    #[test]
    fn controls_are_cleaned() {
        assert_eq!(clean("a\x1B[2Jb\tc\n"), "a[2Jb c\n");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 5), "hell~");
        assert_eq!(truncate("hello", 0), "");
    }
}
