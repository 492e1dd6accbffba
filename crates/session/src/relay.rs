//! Text handling on the output path: chunk decoding and speech cleanup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

// CSI, OSC (BEL or ST terminated), other escapes, then stray C0 controls
static CONTROL_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[ -/]*[0-~]|[\x00-\x08\x0b-\x1f\x7f]",
    )
    .expect("control sequence pattern is valid")
});

/// Incremental UTF-8 decoder.
///
/// Holds back an incomplete trailing sequence until the next chunk so a
/// character split across reads is never mangled. Invalid bytes become
/// U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    /// Bytes waiting for the rest of their character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Remove escape sequences and control characters, keeping newlines and tabs.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    CONTROL_SEQUENCE.replace_all(text, "")
}

/// Text worth handing to the speech backend, if any.
pub fn speakable(text: &str) -> Option<String> {
    let stripped = strip_ansi(text);
    let trimmed = stripped.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn ascii_passes_straight_through() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.decode(b"ls -la\r\n"), "ls -la\r\n");
        assert_eq!(carry.pending(), 0);
    }

    #[test]
    fn split_character_is_held_until_complete() {
        let bytes = "こんにちは".as_bytes();
        let mut carry = Utf8Carry::default();

        assert_eq!(carry.decode(&bytes[..4]), "こ");
        assert_eq!(carry.pending(), 1);
        assert_eq!(carry.decode(&bytes[4..]), "んにちは");
        assert_eq!(carry.pending(), 0);
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(carry.pending(), 0);
    }

    #[test]
    fn byte_at_a_time_decodes_everything() {
        let text = "é中😀x";
        let mut carry = Utf8Carry::default();
        let decoded: String = text.bytes().map(|b| carry.decode(&[b])).collect();
        assert_eq!(decoded, text);
    }

    #[test_case("\x1b[31mred\x1b[0m", "red" ; "sgr")]
    #[test_case("\x1b[2J\x1b[Hprompt$ ", "prompt$ " ; "clear and home")]
    #[test_case("\x1b]0;title\x07text", "text" ; "osc with bel")]
    #[test_case("\x1b]7;file://host/tmp\x1b\\text", "text" ; "osc with st")]
    #[test_case("\x1b(Bplain\x1b=", "plain" ; "charset and keypad")]
    #[test_case("a\rb\x08c\x07", "abc" ; "c0 controls")]
    #[test_case("one\ntwo\tthree", "one\ntwo\tthree" ; "newline and tab kept")]
    fn strips_control_sequences(input: &str, expected: &str) {
        assert_eq!(strip_ansi(input), expected);
    }

    #[test]
    fn pattern_is_shared_across_reader_threads() {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    scope.spawn(move || strip_ansi(&format!("\x1b[3{i}mline {i}")).into_owned())
                })
                .collect();
            for (i, handle) in handles.into_iter().enumerate() {
                assert_eq!(handle.join().unwrap(), format!("line {i}"));
            }
        });
    }

    #[test]
    fn whitespace_only_is_not_speakable() {
        assert_eq!(speakable("\x1b[K\r\n  "), None);
        assert_eq!(speakable("\x1b[1m total 8 \x1b[0m\r\n").as_deref(), Some("total 8"));
    }
}
