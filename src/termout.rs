use crate::frame::Attr;
use std::io::{Result, Write};

/// Output buffer for the terminal
///
/// This just buffers byte data on the way to the terminal.  It allows
/// batching up a whole screen update before handing it to the paced
/// writer.  This is shared between the [`Terminal`] actor and the
/// actor that renders frames.
///
/// Note that coordinates and sizes are passed as `i32` here, because
/// that is more convenient when relative offsets might be negative.
///
/// [`Terminal`]: struct.Terminal.html
pub struct TermOut {
    buf: Vec<u8>,
    flush_to: usize,
    features: Features,
    size: (i32, i32),
    pub(crate) new_cleanup: Option<Vec<u8>>,
}

impl TermOut {
    pub(crate) fn new(features: Features, size: (i32, i32)) -> Self {
        Self {
            buf: Vec::new(),
            flush_to: 0,
            features,
            new_cleanup: None,
            size,
        }
    }

    /// Get the features supported by the terminal
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Get terminal size: (rows, columns)
    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    /// Mark all the data from the start of the buffer to the current
    /// end of the buffer as ready for flushing.  However the data
    /// won't be sent until the [`Terminal`] actor receives a
    /// [`Terminal::flush`] call.
    ///
    /// [`Terminal::flush`]: struct.Terminal.html#method.flush
    /// [`Terminal`]: struct.Terminal.html
    pub fn flush(&mut self) {
        self.flush_to = self.buf.len();
    }

    /// Add a chunk of byte data to the output buffer.
    ///
    /// See also the `Write` implementation, which allows use of
    /// `write!` to add data to the buffer.
    #[inline]
    pub fn out(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Add a single byte to the output buffer.
    pub fn out1(&mut self, v1: u8) {
        self.buf.push(v1);
    }

    /// Add two bytes to the output buffer.
    pub fn out2(&mut self, v1: u8, v2: u8) {
        self.buf.push(v1);
        self.buf.push(v2);
    }

    /// Add three bytes to the output buffer.
    pub fn out3(&mut self, v1: u8, v2: u8, v3: u8) {
        self.buf.push(v1);
        self.buf.push(v2);
        self.buf.push(v3);
    }

    /// Add a character, encoded as UTF-8
    pub fn out_char(&mut self, ch: char) {
        let mut tmp = [0u8; 4];
        self.out(ch.encode_utf8(&mut tmp).as_bytes());
    }

    /// Add a 1-3 digit decimal number to the output buffer, as used
    /// in control sequences.  If number is out of range, then nearest
    /// valid number is used.
    pub fn out_num(&mut self, v: i32) {
        if v <= 0 {
            self.out1(b'0');
        } else if v <= 9 {
            self.out1(v as u8 + b'0');
        } else if v <= 99 {
            self.out2((v / 10) as u8 + b'0', (v % 10) as u8 + b'0');
        } else if v <= 999 {
            self.out3(
                (v / 100) as u8 + b'0',
                (v / 10 % 10) as u8 + b'0',
                (v % 10) as u8 + b'0',
            );
        } else {
            self.out3(b'9', b'9', b'9');
        }
    }

    /// Add ANSI sequence to move cursor to the given coordinates.
    /// Note that coordinates are row-first, with (0,0) as top-left.
    pub fn to(&mut self, y: i32, x: i32) {
        self.out2(27, b'[');
        self.out_num(y + 1);
        self.out1(b';');
        self.out_num(x + 1);
        self.out1(b'H');
    }

    /// Add the SGR sequence that changes attributes from `prev` to
    /// `next`.  Nothing is added if they are the same.  Attributes
    /// can only be switched off all together on a VT100, so if
    /// anything goes off the sequence starts with a reset.
    pub fn attr(&mut self, prev: Attr, next: Attr) {
        if prev == next {
            return;
        }
        let (reset, add) = if (prev & !next).is_empty() {
            (false, next & !prev)
        } else {
            (true, next)
        };
        self.out2(27, b'[');
        let mut first = true;
        if reset {
            self.out1(b'0');
            first = false;
        }
        for (flag, code) in [
            (Attr::BOLD, b'1'),
            (Attr::UNDERLINE, b'4'),
            (Attr::BLINK, b'5'),
            (Attr::REVERSE, b'7'),
        ] {
            if add.contains(flag) {
                if !first {
                    self.out1(b';');
                }
                self.out1(code);
                first = false;
            }
        }
        self.out1(b'm');
    }

    /// Add sequence to select the DEC special graphics set (`true`)
    /// or US ASCII (`false`) as G0
    pub fn graphics(&mut self, on: bool) {
        self.out3(27, b'(', if on { b'0' } else { b'B' });
    }

    /// Add ANSI sequence to show cursor
    pub fn show_cursor(&mut self) {
        self.out(b"\x1B[?25h");
    }

    /// Add ANSI sequence to hide cursor
    pub fn hide_cursor(&mut self) {
        self.out(b"\x1B[?25l");
    }

    /// Add ANSI sequence to move to origin (top-left)
    pub fn origin(&mut self) {
        self.out(b"\x1B[H");
    }

    /// Add ANSI sequence to erase to end-of-display
    pub fn erase_eod(&mut self) {
        self.out(b"\x1B[J");
    }

    /// Add ANSI sequence to reset attributes to the default
    pub fn attr_reset(&mut self) {
        self.out(b"\x1B[0m");
    }

    /// Move cursor to bottom line and do a linefeed.  This results in
    /// the screen scrolling one line, and the cursor being left at
    /// the bottom-left corner.
    pub fn scroll_up(&mut self) {
        self.to(self.size.0 - 1, 0);
        self.out2(13, 10);
    }

    /// Save the current contents of the output buffer as the cleanup
    /// string, then clear the output buffer.  The cleanup string will
    /// be output to the terminal on error, on exit or on panic.  It
    /// should reset any settings that have been modified and put the
    /// cursor somewhere sensible.  Default is `Esc c` which completely
    /// resets the terminal.  This will take effect on the next flush.
    pub fn save_cleanup(&mut self) {
        self.new_cleanup = Some(self.buf.drain(..).collect());
        self.flush_to = 0;
    }

    pub(crate) fn data_len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn data_to_flush(&self) -> &[u8] {
        &self.buf[..self.flush_to]
    }

    pub(crate) fn drain_flush(&mut self) {
        self.buf.drain(..self.flush_to);
        self.flush_to = 0;
    }

    // Discard all buffered contents
    pub(crate) fn discard(&mut self) {
        self.buf.clear();
        self.flush_to = 0;
    }
}

impl Write for TermOut {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Logically we consider the final destination of the Write trait
    /// to be the buffer.  So this `flush` call does nothing.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Features supported by the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    /// Accepts UTF-8?  If not, line drawing uses the DEC special
    /// graphics set and other non-ASCII is replaced.
    pub utf8: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn termout() -> TermOut {
        TermOut::new(Features::default(), (24, 80))
    }

    pub(crate) fn take(to: &mut TermOut) -> Vec<u8> {
        to.flush();
        let data = to.data_to_flush().to_vec();
        to.drain_flush();
        data
    }

    #[test]
    fn cursor_position_is_one_based() {
        let mut to = termout();
        to.to(0, 0);
        to.to(22, 131);
        assert_eq!(take(&mut to), b"\x1B[1;1H\x1B[23;132H".to_vec());
    }

    #[test]
    fn attr_on_is_additive() {
        let mut to = termout();
        to.attr(Attr::BOLD, Attr::BOLD | Attr::REVERSE);
        assert_eq!(take(&mut to), b"\x1B[7m".to_vec());
    }

    #[test]
    fn attr_off_resets_then_restores() {
        let mut to = termout();
        to.attr(Attr::BOLD | Attr::UNDERLINE, Attr::UNDERLINE);
        to.attr(Attr::BOLD, Attr::empty());
        assert_eq!(take(&mut to), b"\x1B[0;4m\x1B[0m".to_vec());
    }

    #[test]
    fn unchanged_attr_emits_nothing() {
        let mut to = termout();
        to.attr(Attr::BLINK, Attr::BLINK);
        assert!(take(&mut to).is_empty());
    }

    #[test]
    fn only_flushed_data_is_handed_over() {
        let mut to = termout();
        to.out(b"abc");
        to.flush();
        to.out(b"def");
        assert_eq!(to.data_to_flush(), b"abc");
        to.drain_flush();
        to.flush();
        assert_eq!(to.data_to_flush(), b"def");
    }
}
