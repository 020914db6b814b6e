//! Minimised frame updates
//!
//! The renderer keeps a copy of the frame last sent to the terminal.
//! Each pass compares the new frame against it and emits, for every
//! maximal run of changed cells on a row, one cursor-position
//! sequence followed by the run's characters.  Attribute and
//! character-set changes are only emitted where they actually
//! change.  The cursor is put in place after all cell writes.

use crate::frame::{Attr, Cell, Frame};
use crate::termout::TermOut;
use log::debug;

/// State of the physical terminal as far as we know it
pub struct Renderer {
    prev: Option<Frame>,
    attr: Attr,
    graphics: bool,
    // Cursor as last placed: None if not yet known
    cursor: Option<Option<(i32, i32)>>,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            prev: None,
            attr: Attr::empty(),
            graphics: false,
            cursor: None,
        }
    }

    /// Forget what is on the terminal, so that the next pass clears
    /// the screen and redraws every cell.  Used on first paint and
    /// whenever the terminal may have been disturbed.
    pub fn invalidate(&mut self) {
        self.prev = None;
        self.cursor = None;
    }

    /// Add to `out` whatever is needed to bring the terminal from the
    /// previous frame to `frame`.  Returns `true` if anything was
    /// added.  Rendering the same frame twice adds nothing the
    /// second time.
    pub fn render(&mut self, frame: &Frame, out: &mut TermOut) -> bool {
        let utf8 = out.features().utf8;
        let start = out.data_len();
        let prev = match self.prev.take() {
            Some(prev) if prev.size() == frame.size() => Some(prev),
            _ => {
                debug!("full redraw");
                out.attr_reset();
                out.graphics(false);
                out.origin();
                out.erase_eod();
                self.attr = Attr::empty();
                self.graphics = false;
                self.cursor = None;
                None
            }
        };

        let (sy, sx) = frame.size();
        let mut wrote_cells = false;
        for y in 0..sy {
            let row = frame.row(y);
            let old = prev.as_ref().map(|p| p.row(y));
            let mut x = 0;
            while x < sx {
                if old.map_or(false, |old| old[x as usize] == row[x as usize]) {
                    x += 1;
                    continue;
                }
                out.to(y, x);
                while x < sx && old.map_or(true, |old| old[x as usize] != row[x as usize]) {
                    self.put(out, row[x as usize], utf8);
                    x += 1;
                }
                wrote_cells = true;
            }
        }

        let cursor = frame.cursor();
        if wrote_cells || self.cursor != Some(cursor) {
            match cursor {
                Some((y, x)) => {
                    out.to(y, x);
                    if self.cursor.map_or(true, |c| c.is_none()) {
                        out.show_cursor();
                    }
                }
                None => {
                    if self.cursor.map_or(true, |c| c.is_some()) {
                        out.hide_cursor();
                    }
                }
            }
            self.cursor = Some(cursor);
        }

        self.prev = Some(frame.clone());
        out.data_len() != start
    }

    fn put(&mut self, out: &mut TermOut, cell: Cell, utf8: bool) {
        out.attr(self.attr, cell.attr);
        self.attr = cell.attr;
        if utf8 {
            self.set_graphics(out, false);
            out.out_char(cell.ch);
        } else if let Some(g) = dec_graphic(cell.ch) {
            self.set_graphics(out, true);
            out.out1(g);
        } else {
            self.set_graphics(out, false);
            out.out1(if cell.ch.is_ascii() && !cell.ch.is_ascii_control() {
                cell.ch as u8
            } else {
                b'?'
            });
        }
    }

    fn set_graphics(&mut self, out: &mut TermOut, on: bool) {
        if self.graphics != on {
            out.graphics(on);
            self.graphics = on;
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

// Map box-drawing and a few symbols onto the DEC special graphics set
fn dec_graphic(ch: char) -> Option<u8> {
    Some(match ch {
        '─' => b'q',
        '│' => b'x',
        '┌' => b'l',
        '┐' => b'k',
        '└' => b'm',
        '┘' => b'j',
        '├' => b't',
        '┤' => b'u',
        '┬' => b'w',
        '┴' => b'v',
        '┼' => b'n',
        '•' | '·' => b'~',
        '◆' => b'`',
        '°' => b'f',
        '±' => b'g',
        '≤' => b'y',
        '≥' => b'z',
        '£' => b'}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::styled;
    use crate::termout::tests::{take, termout};
    use proptest::prelude::*;

    fn count(hay: &[u8], needle: &[u8]) -> usize {
        hay.windows(needle.len()).filter(|w| *w == needle).count()
    }

    // Number of CUP sequences, i.e. ESC [ digits ; digits H
    fn cup_count(data: &[u8]) -> usize {
        let mut n = 0;
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 27 && data[i + 1] == b'[' {
                let mut j = i + 2;
                while j < data.len() && (data[j].is_ascii_digit() || data[j] == b';') {
                    j += 1;
                }
                if j < data.len() && data[j] == b'H' && data[i + 2..j].contains(&b';') {
                    n += 1;
                }
                i = j;
            } else {
                i += 1;
            }
        }
        n
    }

    // Printable bytes outside of escape sequences
    fn printed(data: &[u8]) -> usize {
        let mut n = 0;
        let mut i = 0;
        while i < data.len() {
            if data[i] == 27 {
                i += 1;
                if i < data.len() && data[i] == b'(' {
                    i += 2;
                    continue;
                }
                if i < data.len() && data[i] == b'[' {
                    i += 1;
                    while i < data.len() && !data[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                }
                i += 1;
            } else {
                n += 1;
                i += 1;
            }
        }
        n
    }

    fn painted(frame: &Frame) -> Renderer {
        let mut r = Renderer::new();
        let mut to = termout();
        r.render(frame, &mut to);
        r
    }

    #[test]
    fn first_paint_clears_and_draws() {
        let mut frame = Frame::new(2, 3);
        frame.full().write(0, 0, Attr::empty(), "abc");
        let mut r = Renderer::new();
        let mut to = termout();
        assert!(r.render(&frame, &mut to));
        let data = take(&mut to);
        assert!(data.starts_with(b"\x1B[0m\x1B(B\x1B[H\x1B[J"));
        assert_eq!(cup_count(&data), 2);
        assert_eq!(count(&data, b"abc"), 1);
        assert!(data.ends_with(b"\x1B[?25l"));
    }

    #[test]
    fn same_frame_twice_is_silent() {
        let mut frame = Frame::new(3, 5);
        frame.full().write(1, 1, Attr::BOLD, "hey");
        frame.set_cursor(Some((2, 0)));
        let mut r = painted(&frame);
        let mut to = termout();
        assert!(!r.render(&frame, &mut to));
        assert!(take(&mut to).is_empty());
    }

    #[test]
    fn single_run_single_move() {
        let mut a = Frame::new(3, 10);
        a.full().write(1, 0, Attr::empty(), "hello world");
        let mut r = painted(&a);
        let mut b = a.clone();
        b.full().write(1, 2, Attr::empty(), "LLO");
        let mut to = termout();
        r.render(&b, &mut to);
        assert_eq!(take(&mut to), b"\x1B[2;3HLLO".to_vec());
    }

    #[test]
    fn attributes_only_change_at_boundaries() {
        let a = Frame::new(1, 10);
        let mut r = painted(&a);
        let mut b = a.clone();
        {
            let mut full = b.full();
            full.write(0, 0, Attr::BOLD, "ab");
            full.write(0, 2, Attr::BOLD | Attr::REVERSE, "cd");
            full.write(0, 4, Attr::empty(), "ef");
        }
        let mut to = termout();
        r.render(&b, &mut to);
        assert_eq!(take(&mut to), b"\x1B[1;1H\x1B[1mab\x1B[7mcd\x1B[0mef".to_vec());
    }

    #[test]
    fn box_drawing_uses_dec_graphics() {
        let a = Frame::new(1, 4);
        let mut r = painted(&a);
        let mut b = a.clone();
        b.full().write(0, 0, Attr::empty(), "┌─┐x");
        let mut to = termout();
        r.render(&b, &mut to);
        assert_eq!(take(&mut to), b"\x1B[1;1H\x1B(0lqk\x1B(Bx".to_vec());
    }

    #[test]
    fn non_ascii_degrades() {
        let a = Frame::new(1, 2);
        let mut r = painted(&a);
        let mut b = a.clone();
        b.full().write(0, 0, Attr::empty(), "éa");
        let mut to = termout();
        r.render(&b, &mut to);
        assert_eq!(take(&mut to), b"\x1B[1;1H?a".to_vec());
    }

    #[test]
    fn cursor_moves_after_cells() {
        let a = Frame::new(2, 4);
        let mut r = painted(&a);
        let mut b = a.clone();
        b.full().write(0, 0, Attr::empty(), "x");
        b.set_cursor(Some((1, 2)));
        let mut to = termout();
        r.render(&b, &mut to);
        assert_eq!(take(&mut to), b"\x1B[1;1Hx\x1B[2;3H\x1B[?25h".to_vec());

        // Cursor-only change
        let mut c = b.clone();
        c.set_cursor(Some((0, 0)));
        r.render(&c, &mut to);
        assert_eq!(take(&mut to), b"\x1B[1;1H".to_vec());
    }

    #[test]
    fn invalidate_forces_full_redraw() {
        let mut a = Frame::new(2, 2);
        a.full().write(0, 0, Attr::empty(), "ab");
        let mut r = painted(&a);
        r.invalidate();
        let mut to = termout();
        r.render(&a, &mut to);
        let data = take(&mut to);
        assert_eq!(cup_count(&data), 2);
        assert_eq!(printed(&data), 4);
    }

    fn frame_strategy(sy: i32, sx: i32) -> impl Strategy<Value = Frame> {
        let cell = (prop::sample::select(vec![' ', 'a', 'b', '─']), 0u8..4).prop_map(|(ch, a)| {
            Cell::new(ch, Attr::from_bits_truncate(a))
        });
        prop::collection::vec(cell, (sy * sx) as usize).prop_map(move |cells| {
            let mut f = Frame::new(sy, sx);
            for (i, c) in cells.into_iter().enumerate() {
                f.set(i as i32 / sx, i as i32 % sx, c);
            }
            f
        })
    }

    proptest! {
        #[test]
        fn diff_is_minimal(a in frame_strategy(4, 6), b in frame_strategy(4, 6)) {
            let mut r = painted(&a);
            let mut to = termout();
            r.render(&b, &mut to);
            let data = take(&mut to);

            let mut changed = 0;
            let mut runs = 0;
            for y in 0..4 {
                let mut in_run = false;
                for x in 0..6 {
                    let diff = a.get(y, x) != b.get(y, x);
                    if diff {
                        changed += 1;
                        if !in_run {
                            runs += 1;
                        }
                    }
                    in_run = diff;
                }
            }
            prop_assert!(cup_count(&data) <= runs);
            prop_assert_eq!(printed(&data), changed);

            let mut again = termout();
            prop_assert!(!r.render(&b, &mut again));
        }
    }

    #[test]
    fn styled_helper_matches_write() {
        let mut a = Frame::new(1, 3);
        a.full().cells(0, 0, &styled("ab", Attr::UNDERLINE));
        assert_eq!(a.get(0, 1), Some(Cell::new('b', Attr::UNDERLINE)));
    }
}
