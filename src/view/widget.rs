//! Input widgets shared by the login and composer screens

use crate::frame::{Attr, Region};
use crate::key::Key;

/// Single-line text field
pub struct LineInput {
    text: Vec<char>,
    cursor: usize,
    obscured: bool,
}

impl LineInput {
    pub fn new(text: &str) -> Self {
        let text: Vec<char> = text.chars().collect();
        Self {
            cursor: text.len(),
            text,
            obscured: false,
        }
    }

    /// A field that displays `*` for each character
    pub fn obscured() -> Self {
        Self {
            obscured: true,
            ..Self::new("")
        }
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Apply an editing key.  Returns `false` if the key isn't one
    /// this field handles.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Char(ch) => {
                self.text.insert(self.cursor, ch);
                self.cursor += 1;
            }
            Key::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.text.remove(self.cursor);
            }
            Key::Delete if self.cursor < self.text.len() => {
                self.text.remove(self.cursor);
            }
            Key::Backspace | Key::Delete => (),
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.text.len()),
            Key::Home | Key::Ctrl('a') => self.cursor = 0,
            Key::End | Key::Ctrl('e') => self.cursor = self.text.len(),
            Key::Ctrl('u') => self.clear(),
            _ => return false,
        }
        true
    }

    /// Draw into a single-row region, scrolled so that the cursor is
    /// visible, and place the frame cursor if focused
    pub fn render(&self, r: &mut Region<'_>, focused: bool) {
        let width = r.size().1.max(1) as usize;
        let skip = (self.cursor + 1).saturating_sub(width);
        r.clear(Attr::UNDERLINE);
        let shown: String = if self.obscured {
            "*".repeat(self.text.len().saturating_sub(skip).min(width))
        } else {
            self.text.iter().skip(skip).take(width).collect()
        };
        r.write(0, 0, Attr::UNDERLINE, &shown);
        if focused {
            r.cursor(0, (self.cursor - skip) as i32);
        }
    }
}

/// Multi-line text field.  Text is broken into display rows by
/// newlines and at the field width, so that every character has a
/// fixed display position for cursor movement.
pub struct TextArea {
    text: Vec<char>,
    cursor: usize,
    top: usize,
    width: usize,
}

impl TextArea {
    pub fn new(text: &str) -> Self {
        let text: Vec<char> = text.chars().collect();
        Self {
            cursor: text.len(),
            text,
            top: 0,
            width: 1,
        }
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    // Start offset of each display row
    fn rows(&self) -> Vec<usize> {
        let mut rows = vec![0];
        let mut col = 0;
        for (i, &ch) in self.text.iter().enumerate() {
            if ch == '\n' {
                rows.push(i + 1);
                col = 0;
            } else {
                col += 1;
                if col == self.width && i + 1 < self.text.len() && self.text[i + 1] != '\n' {
                    rows.push(i + 1);
                    col = 0;
                }
            }
        }
        rows
    }

    // (row, column) of a text offset
    fn position(&self, rows: &[usize], offset: usize) -> (usize, usize) {
        let row = rows.iter().rposition(|&start| start <= offset).unwrap_or(0);
        (row, offset - rows[row])
    }

    fn row_len(&self, rows: &[usize], row: usize) -> usize {
        let end = rows.get(row + 1).copied().unwrap_or(self.text.len());
        let len = end - rows[row];
        if end > rows[row] && self.text.get(end - 1) == Some(&'\n') {
            len - 1
        } else {
            len
        }
    }

    fn vertical(&mut self, down: bool) -> bool {
        let rows = self.rows();
        let (row, col) = self.position(&rows, self.cursor);
        let target = if down {
            if row + 1 >= rows.len() {
                return false;
            }
            row + 1
        } else {
            match row.checked_sub(1) {
                Some(r) => r,
                None => return false,
            }
        };
        self.cursor = rows[target] + col.min(self.row_len(&rows, target));
        true
    }

    /// Apply an editing key.  Returns `false` if the key isn't one
    /// this field handles, including Up on the first row and Down on
    /// the last.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Char(ch) => {
                self.text.insert(self.cursor, ch);
                self.cursor += 1;
            }
            Key::Enter => {
                self.text.insert(self.cursor, '\n');
                self.cursor += 1;
            }
            Key::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.text.remove(self.cursor);
            }
            Key::Delete if self.cursor < self.text.len() => {
                self.text.remove(self.cursor);
            }
            Key::Backspace | Key::Delete => (),
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.text.len()),
            Key::Up => return self.vertical(false),
            Key::Down => return self.vertical(true),
            Key::Home | Key::Ctrl('a') => {
                let rows = self.rows();
                let (row, _) = self.position(&rows, self.cursor);
                self.cursor = rows[row];
            }
            Key::End | Key::Ctrl('e') => {
                let rows = self.rows();
                let (row, _) = self.position(&rows, self.cursor);
                self.cursor = rows[row] + self.row_len(&rows, row);
            }
            _ => return false,
        }
        true
    }

    pub fn render(&mut self, r: &mut Region<'_>, focused: bool) {
        let (sy, sx) = r.size();
        self.width = sx.max(1) as usize;
        let height = sy.max(1) as usize;
        let rows = self.rows();
        let (crow, ccol) = self.position(&rows, self.cursor);
        if crow < self.top {
            self.top = crow;
        } else if crow >= self.top + height {
            self.top = crow + 1 - height;
        }
        r.clear(Attr::empty());
        for (y, row) in (self.top..rows.len()).take(height).enumerate() {
            let start = rows[row];
            let line: String = self.text[start..start + self.row_len(&rows, row)]
                .iter()
                .collect();
            r.write(y as i32, 0, Attr::empty(), &line);
        }
        if focused {
            // A full row leaves the cursor just past its end
            let ccol = ccol.min(self.width - 1);
            r.cursor((crow - self.top) as i32, ccol as i32);
        }
    }
}

/// Horizontal choice between fixed options
pub struct Select {
    options: Vec<&'static str>,
    index: usize,
}

impl Select {
    pub fn new(options: Vec<&'static str>, index: usize) -> Self {
        let index = index.min(options.len().saturating_sub(1));
        Self { options, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handle_key(&mut self, key: Key) -> bool {
        match key {
            Key::Left | Key::Char('h') => self.index = self.index.saturating_sub(1),
            Key::Right | Key::Char('l') | Key::Char(' ') => {
                self.index = (self.index + 1).min(self.options.len().saturating_sub(1))
            }
            _ => return false,
        }
        true
    }

    pub fn render(&self, r: &mut Region<'_>, focused: bool) {
        let mut x = 0;
        for (i, label) in self.options.iter().enumerate() {
            let attr = if i == self.index {
                Attr::REVERSE
            } else {
                Attr::empty()
            };
            if i == self.index && focused {
                r.cursor(0, x);
            }
            x = r.write(0, x, attr, &format!(" {} ", label)) + 1;
        }
    }
}

/// Draw a button as `< label >`, reversed when focused
pub fn button(r: &mut Region<'_>, x: i32, label: &str, focused: bool) -> i32 {
    let attr = if focused {
        Attr::REVERSE
    } else {
        Attr::empty()
    };
    let end = r.write(0, x, attr, &format!("< {} >", label));
    if focused {
        r.cursor(0, x + 2);
    }
    end
}

/// Index of the focus ring member after `Tab`, `BackTab` or an arrow
/// key, or `None` if the key doesn't move focus
pub fn move_focus(key: Key, focus: usize, count: usize) -> Option<usize> {
    match key {
        Key::Tab | Key::Down => Some((focus + 1) % count),
        Key::BackTab | Key::Up => Some((focus + count - 1) % count),
        _ => None,
    }
}
