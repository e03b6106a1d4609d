// Raw byte → key decoding shared by the line editor and the selection menu.
//
// Escape sequences arrive whole from the terminal driver, so only UTF-8
// characters are buffered across chunks.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Esc,
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-D.
    Eof,
    /// Ctrl-U.
    KillLine,
    /// Anything not mapped above, kept verbatim.
    Unknown(Vec<u8>),
}

const CTRL_A: u8 = 0x01;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const CTRL_E: u8 = 0x05;
const CTRL_H: u8 = 0x08;
const CTRL_U: u8 = 0x15;
const ESC: u8 = 0x1b;
const DEL: u8 = 0x7f;

#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut keys = Vec::new();
        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            match byte {
                CTRL_A => keys.push(Key::Home),
                CTRL_C => keys.push(Key::Interrupt),
                CTRL_D => keys.push(Key::Eof),
                CTRL_E => keys.push(Key::End),
                CTRL_U => keys.push(Key::KillLine),
                CTRL_H | DEL => keys.push(Key::Backspace),
                b'\r' => {
                    keys.push(Key::Enter);
                    // Treat CRLF from piped input as a single Enter.
                    if input.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                }
                b'\n' => keys.push(Key::Enter),
                ESC => {
                    let (key, consumed) = decode_escape(&input[i..]);
                    keys.push(key);
                    i += consumed;
                    continue;
                }
                0x00..=0x1f => keys.push(Key::Unknown(vec![byte])),
                _ => {
                    let width = utf8_width(byte);
                    let end = (i + width).min(input.len());
                    if !input[i + 1..end].iter().copied().all(is_continuation) {
                        // Broken sequence: drop the lead byte, keep what follows.
                        keys.push(Key::Unknown(vec![byte]));
                        i += 1;
                        continue;
                    }
                    if end < i + width {
                        self.pending = input[i..].to_vec();
                        break;
                    }
                    let slice = &input[i..end];
                    match std::str::from_utf8(slice).ok().and_then(|s| s.chars().next()) {
                        Some(ch) => keys.push(Key::Char(ch)),
                        None => keys.push(Key::Unknown(slice.to_vec())),
                    }
                    i += width;
                    continue;
                }
            }
            i += 1;
        }
        keys
    }
}

/// Decode an escape sequence at the start of `bytes`. Returns the key and the
/// number of bytes consumed.
fn decode_escape(bytes: &[u8]) -> (Key, usize) {
    match bytes.get(1) {
        None => (Key::Esc, 1),
        Some(b'[') | Some(b'O') => {
            let body = &bytes[2..];
            let Some(final_pos) = body.iter().position(|b| (0x40..=0x7e).contains(b)) else {
                return (Key::Unknown(bytes.to_vec()), bytes.len());
            };
            let consumed = 2 + final_pos + 1;
            let params = &body[..final_pos];
            let key = match (body[final_pos], params) {
                (b'A', _) => Key::Up,
                (b'B', _) => Key::Down,
                (b'C', _) => Key::Right,
                (b'D', _) => Key::Left,
                (b'H', _) => Key::Home,
                (b'F', _) => Key::End,
                (b'~', b"1") | (b'~', b"7") => Key::Home,
                (b'~', b"4") | (b'~', b"8") => Key::End,
                (b'~', b"3") => Key::Delete,
                _ => Key::Unknown(bytes[..consumed].to_vec()),
            };
            (key, consumed)
        }
        Some(_) => (Key::Esc, 1),
    }
}

fn is_continuation(byte: u8) -> bool {
    (0x80..=0xbf).contains(&byte)
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_and_control_bytes() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"hi\x7f\r\x03\x04"),
            vec![
                Key::Char('h'),
                Key::Char('i'),
                Key::Backspace,
                Key::Enter,
                Key::Interrupt,
                Key::Eof
            ]
        );
    }

    #[test]
    fn arrow_and_navigation_sequences() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"\x1b[A\x1b[B\x1bOC\x1b[D\x1b[3~\x1b[H"),
            vec![Key::Up, Key::Down, Key::Right, Key::Left, Key::Delete, Key::Home]
        );
    }

    #[test]
    fn lone_escape_is_esc_key() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\x1b"), vec![Key::Esc]);
    }

    #[test]
    fn unknown_sequences_are_kept_whole() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"\x1b[13;5ux"),
            vec![Key::Unknown(b"\x1b[13;5u".to_vec()), Key::Char('x')]
        );
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut decoder = KeyDecoder::new();
        let bytes = "é".as_bytes();
        assert!(decoder.feed(&bytes[..1]).is_empty());
        assert_eq!(decoder.feed(&bytes[1..]), vec![Key::Char('é')]);
    }

    #[test]
    fn crlf_is_a_single_enter() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"a\r\nb\n"),
            vec![Key::Char('a'), Key::Enter, Key::Char('b'), Key::Enter]
        );
    }

    #[test]
    fn invalid_lead_byte_keeps_following_keys() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(&[0xe2, b'a', b'b']),
            vec![Key::Unknown(vec![0xe2]), Key::Char('a'), Key::Char('b')]
        );
        assert_eq!(
            decoder.feed(&[0xff, 0x80, b'c']),
            vec![Key::Unknown(vec![0xff]), Key::Unknown(vec![0x80]), Key::Char('c')]
        );
    }

    #[test]
    fn truncated_sequence_followed_by_ascii_is_not_buffered() {
        let mut decoder = KeyDecoder::new();
        let euro = "€".as_bytes();
        let mut bytes = euro[..2].to_vec();
        bytes.push(b'x');
        assert_eq!(
            decoder.feed(&bytes),
            vec![Key::Unknown(vec![euro[0]]), Key::Unknown(vec![euro[1]]), Key::Char('x')]
        );
        assert_eq!(decoder.feed("€".as_bytes()), vec![Key::Char('€')]);
    }
}
