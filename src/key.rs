/// A decoded keypress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// Control key, given as the lowercase letter, e.g. `Ctrl('c')`
    Ctrl(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
    /// Function key, F1 to F12.  On a VT100 PF1-PF4 map to F1-F4.
    F(u8),
    /// Byte that can't be decoded as anything else
    Byte(u8),
}

// Escape sequences recognised.  Both normal and application cursor
// key modes are included since we don't know what mode a real
// terminal was left in.
const SEQUENCES: &[(&[u8], Key)] = &[
    (b"\x1B[A", Key::Up),
    (b"\x1B[B", Key::Down),
    (b"\x1B[C", Key::Right),
    (b"\x1B[D", Key::Left),
    (b"\x1BOA", Key::Up),
    (b"\x1BOB", Key::Down),
    (b"\x1BOC", Key::Right),
    (b"\x1BOD", Key::Left),
    (b"\x1BOP", Key::F(1)),
    (b"\x1BOQ", Key::F(2)),
    (b"\x1BOR", Key::F(3)),
    (b"\x1BOS", Key::F(4)),
    (b"\x1BOM", Key::Enter),
    (b"\x1BOH", Key::Home),
    (b"\x1BOF", Key::End),
    (b"\x1B[H", Key::Home),
    (b"\x1B[F", Key::End),
    (b"\x1B[Z", Key::BackTab),
    (b"\x1B[1~", Key::Home),
    (b"\x1B[2~", Key::Insert),
    (b"\x1B[3~", Key::Delete),
    (b"\x1B[4~", Key::End),
    (b"\x1B[5~", Key::PageUp),
    (b"\x1B[6~", Key::PageDown),
    (b"\x1B[11~", Key::F(1)),
    (b"\x1B[12~", Key::F(2)),
    (b"\x1B[13~", Key::F(3)),
    (b"\x1B[14~", Key::F(4)),
    (b"\x1B[15~", Key::F(5)),
    (b"\x1B[17~", Key::F(6)),
    (b"\x1B[18~", Key::F(7)),
    (b"\x1B[19~", Key::F(8)),
    (b"\x1B[20~", Key::F(9)),
    (b"\x1B[21~", Key::F(10)),
    (b"\x1B[23~", Key::F(11)),
    (b"\x1B[24~", Key::F(12)),
];

/// Longest prefix that will be held waiting for more bytes
const MAX_PENDING: usize = 8;

impl Key {
    /// Attempt to decode one key from the start of `data`.  Returns
    /// the number of bytes consumed and the key, or `None` if more
    /// data is needed.  If `force` is set, then a key is always
    /// returned for non-empty data: a partial escape sequence is
    /// flushed as a lone `Esc` (with the rest decoded as plain keys
    /// on following calls), and a partial UTF-8 sequence as raw
    /// bytes.  This is used when no more data has arrived after a
    /// short delay.
    pub fn decode(data: &[u8], force: bool) -> Option<(usize, Key)> {
        let first = *data.first()?;
        match first {
            27 => Self::decode_esc(data, force),
            8 | 127 => Some((1, Key::Backspace)),
            9 => Some((1, Key::Tab)),
            13 => Some((1, Key::Enter)),
            0 => Some((1, Key::Ctrl('@'))),
            1..=26 => Some((1, Key::Ctrl((b'a' + first - 1) as char))),
            28..=31 => Some((1, Key::Byte(first))),
            32..=126 => Some((1, Key::Char(first as char))),
            _ => Self::decode_utf8(data, force),
        }
    }

    fn decode_esc(data: &[u8], force: bool) -> Option<(usize, Key)> {
        for (seq, key) in SEQUENCES {
            if data.starts_with(seq) {
                return Some((seq.len(), *key));
            }
        }
        let prefix = data.len() < MAX_PENDING
            && SEQUENCES.iter().any(|(seq, _)| seq.starts_with(data));
        if prefix && !force {
            return None;
        }
        // Unknown or abandoned sequence: give up the Esc alone and
        // let the following bytes come through as ordinary keys
        Some((1, Key::Esc))
    }

    fn decode_utf8(data: &[u8], force: bool) -> Option<(usize, Key)> {
        let len = match data[0] {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            b => return Some((1, Key::Byte(b))),
        };
        if data.len() < len {
            let continuing = data[1..].iter().all(|b| (b & 0xC0) == 0x80);
            if continuing && !force {
                return None;
            }
            return Some((1, Key::Byte(data[0])));
        }
        match std::str::from_utf8(&data[..len]) {
            Ok(s) => s.chars().next().map(|c| (len, Key::Char(c))),
            Err(_) => Some((1, Key::Byte(data[0]))),
        }
    }
}

/// Incremental key decoder.  Bytes are pushed as they arrive from
/// the terminal and keys pulled out as soon as they are complete.
/// The only state is the pending bytes of an incomplete sequence.
#[derive(Default)]
pub struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly-read bytes
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Are there bytes held back waiting for the rest of a sequence?
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Iterate over the keys that can be decoded from the pending
    /// bytes.  With `force`, everything pending is turned into keys.
    /// Bytes are only removed once their key has been yielded, so
    /// the iterator can be dropped part-way and resumed later.
    pub fn keys(&mut self, force: bool) -> Keys<'_> {
        Keys {
            decoder: self,
            force,
        }
    }
}

/// Lazy sequence of decoded keys, see [`Decoder::keys`]
pub struct Keys<'a> {
    decoder: &'a mut Decoder,
    force: bool,
}

impl Iterator for Keys<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        let (count, key) = Key::decode(&self.decoder.pending, self.force)?;
        self.decoder.pending.drain(..count);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<Key> {
        let mut dec = Decoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            dec.push(chunk);
            out.extend(dec.keys(false));
        }
        out.extend(dec.keys(true));
        out
    }

    #[test]
    fn printable_and_control() {
        assert_eq!(
            decode_all(&[b"a\r\t\x03\x7F"]),
            vec![
                Key::Char('a'),
                Key::Enter,
                Key::Tab,
                Key::Ctrl('c'),
                Key::Backspace
            ]
        );
    }

    #[test]
    fn arrow_split_across_reads() {
        let mut dec = Decoder::new();
        dec.push(b"\x1B");
        assert_eq!(dec.keys(false).next(), None);
        dec.push(b"[");
        assert_eq!(dec.keys(false).next(), None);
        dec.push(b"A");
        assert_eq!(dec.keys(false).collect::<Vec<_>>(), vec![Key::Up]);
        assert!(!dec.has_pending());
    }

    #[test]
    fn application_mode_keys() {
        assert_eq!(
            decode_all(&[b"\x1BOB\x1BOP\x1B[6~"]),
            vec![Key::Down, Key::F(1), Key::PageDown]
        );
    }

    #[test]
    fn lone_escape_flushed_on_force() {
        let mut dec = Decoder::new();
        dec.push(b"\x1B");
        assert_eq!(dec.keys(false).next(), None);
        assert_eq!(dec.keys(true).collect::<Vec<_>>(), vec![Key::Esc]);
    }

    #[test]
    fn unknown_sequence_is_not_lost() {
        assert_eq!(
            decode_all(&[b"\x1B[9", b"9x"]),
            vec![
                Key::Esc,
                Key::Char('['),
                Key::Char('9'),
                Key::Char('9'),
                Key::Char('x')
            ]
        );
    }

    #[test]
    fn abandoned_prefix_on_timeout() {
        let mut dec = Decoder::new();
        dec.push(b"\x1B[1");
        assert_eq!(dec.keys(false).next(), None);
        assert_eq!(
            dec.keys(true).collect::<Vec<_>>(),
            vec![Key::Esc, Key::Char('['), Key::Char('1')]
        );
    }

    #[test]
    fn utf8_split() {
        let bytes = "é".as_bytes();
        assert_eq!(decode_all(&[&bytes[..1], &bytes[1..]]), vec![Key::Char('é')]);
        assert_eq!(decode_all(&[b"\xC3"]), vec![Key::Byte(0xC3)]);
        assert_eq!(decode_all(&[b"\xFF"]), vec![Key::Byte(0xFF)]);
    }

    #[test]
    fn iterator_can_resume() {
        let mut dec = Decoder::new();
        dec.push(b"ab");
        assert_eq!(dec.keys(false).next(), Some(Key::Char('a')));
        assert_eq!(dec.keys(false).next(), Some(Key::Char('b')));
        assert_eq!(dec.keys(false).next(), None);
    }

    fn input_bytes() -> impl Strategy<Value = Vec<u8>> {
        let piece = prop_oneof![
            Just(b"\x1B[A".to_vec()),
            Just(b"\x1BOQ".to_vec()),
            Just(b"\x1B[5~".to_vec()),
            Just(b"\x1B[21~".to_vec()),
            Just("ü".as_bytes().to_vec()),
            (32u8..127).prop_map(|b| vec![b]),
            (1u8..27).prop_map(|b| vec![b]),
        ];
        prop::collection::vec(piece, 0..20).prop_map(|v| v.concat())
    }

    proptest! {
        #[test]
        fn any_split_gives_same_keys(data in input_bytes(), cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6)) {
            let whole = decode_all(&[&data[..]]);
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(data.len() + 1)).collect();
            points.push(0);
            points.push(data.len());
            points.sort_unstable();
            let chunks: Vec<&[u8]> = points.windows(2).map(|w| &data[w[0]..w[1]]).collect();
            prop_assert_eq!(decode_all(&chunks), whole);
        }

        #[test]
        fn garbage_never_loses_bytes(data in prop::collection::vec(any::<u8>(), 0..64)) {
            let mut dec = Decoder::new();
            dec.push(&data);
            let keys: Vec<Key> = dec.keys(true).collect();
            prop_assert!(!dec.has_pending());
            prop_assert!(keys.len() <= data.len());
            prop_assert_eq!(data.is_empty(), keys.is_empty());
        }
    }
}
