use std::collections::VecDeque;
use std::time::Duration;

const XON: u8 = 0x11;
const XOFF: u8 = 0x13;

/// Paced output queue
///
/// Data flushed from [`TermOut`] is queued here and handed to the
/// transport a chunk at a time.  With pacing on, the caller is
/// expected to yield for [`Pacer::chunk_delay`] between chunks, which
/// keeps a slow terminal from being sent data faster than its line
/// speed.  While output is inhibited (XOFF received, or the transport
/// would block) data accumulates and nothing is handed out.  Nothing
/// is ever dropped.
///
/// [`TermOut`]: struct.TermOut.html
pub struct Pacer {
    queue: VecDeque<u8>,
    chunk: usize,
    paced: bool,
    baud: u32,
    inhibited: bool,
}

impl Pacer {
    pub fn new(paced: bool, chunk: usize, baud: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            chunk: chunk.max(1),
            paced,
            baud: baud.max(50),
            inhibited: false,
        }
    }

    pub fn is_paced(&self) -> bool {
        self.paced
    }

    pub fn queue(&mut self, data: &[u8]) {
        self.queue.extend(data);
    }

    /// Bytes waiting to be written
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_inhibited(&self) -> bool {
        self.inhibited
    }

    /// Stop or restart handing out data
    pub fn inhibit(&mut self, on: bool) {
        self.inhibited = on;
    }

    /// Next run of bytes to attempt to write, or `None` if there is
    /// nothing to send right now.  Paced output is limited to one
    /// chunk.
    pub fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.inhibited || self.queue.is_empty() {
            return None;
        }
        let limit = if self.paced {
            self.chunk
        } else {
            self.queue.len()
        };
        let data = self.queue.make_contiguous();
        Some(&data[..limit.min(data.len())])
    }

    /// Record that `count` bytes from the front of the queue were
    /// accepted by the transport
    pub fn consumed(&mut self, count: usize) {
        self.queue.drain(..count.min(self.queue.len()));
    }

    /// Drop everything queued, for when the terminal is going away
    pub fn discard(&mut self) {
        self.queue.clear();
    }

    /// Time the line needs to transmit `count` bytes, at 10 bits per
    /// character
    pub fn chunk_delay(&self, count: usize) -> Duration {
        Duration::from_micros(count as u64 * 10_000_000 / u64::from(self.baud))
    }
}

/// Remove in-band XON/XOFF bytes from terminal input.  Returns the
/// final flow state seen, `Some(true)` meaning output should be
/// inhibited, or `None` if there were no flow control bytes.
pub fn strip_flow_control(data: &mut Vec<u8>) -> Option<bool> {
    let mut state = None;
    data.retain(|&b| match b {
        XOFF => {
            state = Some(true);
            false
        }
        XON => {
            state = Some(false);
            false
        }
        _ => true,
    });
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaced_hands_out_everything() {
        let mut p = Pacer::new(false, 4, 9600);
        p.queue(b"hello world");
        assert_eq!(p.next_chunk(), Some(&b"hello world"[..]));
        p.consumed(5);
        assert_eq!(p.next_chunk(), Some(&b" world"[..]));
    }

    #[test]
    fn paced_hands_out_chunks() {
        let mut p = Pacer::new(true, 4, 9600);
        p.queue(b"hello world");
        assert_eq!(p.next_chunk(), Some(&b"hell"[..]));
        p.consumed(4);
        assert_eq!(p.next_chunk(), Some(&b"o wo"[..]));
        p.consumed(4);
        assert_eq!(p.next_chunk(), Some(&b"rld"[..]));
        p.consumed(3);
        assert_eq!(p.next_chunk(), None);
    }

    #[test]
    fn inhibited_output_is_kept() {
        let mut p = Pacer::new(true, 4, 9600);
        p.queue(b"ab");
        p.inhibit(true);
        assert_eq!(p.next_chunk(), None);
        p.queue(b"cd");
        assert_eq!(p.pending(), 4);
        p.inhibit(false);
        assert_eq!(p.next_chunk(), Some(&b"abcd"[..]));
    }

    #[test]
    fn partial_write_keeps_rest() {
        let mut p = Pacer::new(false, 4, 9600);
        p.queue(b"abcdef");
        p.consumed(2);
        assert_eq!(p.next_chunk(), Some(&b"cdef"[..]));
    }

    #[test]
    fn delay_follows_baud() {
        let p = Pacer::new(true, 96, 9600);
        assert_eq!(p.chunk_delay(96), Duration::from_millis(100));
        let p = Pacer::new(true, 96, 300);
        assert_eq!(p.chunk_delay(30), Duration::from_secs(1));
    }

    #[test]
    fn xon_xoff_stripped() {
        let mut data = b"a\x13b\x11c\x13".to_vec();
        assert_eq!(strip_flow_control(&mut data), Some(true));
        assert_eq!(data, b"abc".to_vec());
        let mut data = b"plain".to_vec();
        assert_eq!(strip_flow_control(&mut data), None);
    }
}
