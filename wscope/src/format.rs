//! Format
//!
//! Turns raw message payloads into their displayed form: JSON detection and
//! pretty printing for text, fixed-width hex dumps for binary, and a small
//! JSON line tokenizer used for syntax highlighting.

/// Number of bytes shown on each hex dump line.
pub const HEX_DUMP_WIDTH: usize = 24;

/// Columns between tab stops when tabs are expanded for display.
pub const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub pretty_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedText {
    pub is_json: bool,
    /// Only set when the displayed text differs from the raw message.
    pub formatted: Option<String>,
    /// Code point count of every displayed line.
    pub line_lengths: Vec<u32>,
}

pub fn format_text(text: &str, opts: &FormatOptions) -> FormattedText {
    let json = parse_json(text);
    let formatted = match (&json, opts.pretty_json) {
        (Some(value), true) => serde_json::to_string_pretty(value)
            .ok()
            .filter(|pretty| pretty != text),
        _ => None,
    };
    let line_lengths = line_lengths(formatted.as_deref().unwrap_or(text));
    FormattedText {
        is_json: json.is_some(),
        formatted,
        line_lengths,
    }
}

fn parse_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Code point count of every displayed line of `text`, so multi-byte
/// characters count once. Lines are measured as `display_line` shows them.
pub fn line_lengths(text: &str) -> Vec<u32> {
    display_lines(text)
        .map(|line| line.chars().count() as u32)
        .collect()
}

/// Splits `text` into the lines a terminal can show as is.
pub fn display_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n').map(display_line)
}

/// One line made safe to print: a trailing `\r` is dropped, tabs expand to
/// the next tab stop and any other control character becomes `.`, so every
/// char takes exactly one column and nothing reaches the terminal as an
/// escape sequence.
pub fn display_line(line: &str) -> String {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let stop = (column / TAB_WIDTH + 1) * TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(stop - column));
            column = stop;
        } else {
            out.push(if c.is_control() { '.' } else { c });
            column += 1;
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexDump {
    pub lines: Vec<String>,
    /// Offset label for each line, 8 hex digits.
    pub offsets: Vec<String>,
}

impl HexDump {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

pub fn hex_dump(bytes: &[u8]) -> HexDump {
    let hex_width = HEX_DUMP_WIDTH * 3 - 1;
    let mut dump = HexDump::default();
    for (i, chunk) in bytes.chunks(HEX_DUMP_WIDTH).enumerate() {
        let hex = chunk
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        dump.lines
            .push(format!("{:<width$}  {}", hex, ascii, width = hex_width));
        dump.offsets.push(format!("{:08x}", i * HEX_DUMP_WIDTH));
    }
    dump
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Key,
    String,
    Number,
    Literal,
    Punctuation,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    pub token: Token,
    pub text: &'a str,
}

/// Splits one line of (pretty printed) JSON into highlight spans. Works on
/// single lines, so strings are never assumed to continue past the line end.
pub fn highlight_json(line: &str) -> Vec<Span<'_>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let token = match bytes[pos] {
            b'"' => {
                pos += 1;
                while pos < bytes.len() {
                    match bytes[pos] {
                        b'\\' => pos += 2,
                        b'"' => {
                            pos += 1;
                            break;
                        }
                        _ => pos += 1,
                    }
                }
                pos = pos.min(bytes.len());
                let rest = line[pos..].trim_start();
                if rest.starts_with(':') {
                    Token::Key
                } else {
                    Token::String
                }
            }
            b'-' | b'0'..=b'9' => {
                pos += 1;
                while pos < bytes.len()
                    && matches!(bytes[pos], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
                {
                    pos += 1;
                }
                Token::Number
            }
            b'{' | b'}' | b'[' | b']' | b',' | b':' => {
                pos += 1;
                Token::Punctuation
            }
            b if b.is_ascii_alphabetic() => {
                while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                    pos += 1;
                }
                match &line[start..pos] {
                    "true" | "false" | "null" => Token::Literal,
                    _ => Token::Plain,
                }
            }
            _ => {
                // whitespace and anything else, up to the next interesting byte
                pos += 1;
                while pos < bytes.len() && !is_token_start(bytes[pos]) {
                    pos += 1;
                }
                Token::Plain
            }
        };
        spans.push(Span {
            token,
            text: &line[start..pos],
        });
    }
    spans
}

fn is_token_start(b: u8) -> bool {
    matches!(
        b,
        b'"' | b'-' | b'0'..=b'9' | b'{' | b'}' | b'[' | b']' | b',' | b':'
    ) || b.is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_json() {
        let out = format_text("hello\nworld", &FormatOptions::default());
        assert!(!out.is_json);
        assert_eq!(out.formatted, None);
        assert_eq!(out.line_lengths, vec![5, 5]);
    }

    #[test]
    fn pretty_json_reformats() {
        let opts = FormatOptions { pretty_json: true };
        let out = format_text(r#"{"a":1}"#, &opts);
        assert!(out.is_json);
        assert_eq!(out.formatted.as_deref(), Some("{\n  \"a\": 1\n}"));
        assert_eq!(out.line_lengths, vec![1, 8, 1]);
    }

    #[test]
    fn json_detected_without_pretty() {
        let out = format_text("[1, 2]", &FormatOptions::default());
        assert!(out.is_json);
        assert_eq!(out.formatted, None);
        assert!(!format_text("{not json", &FormatOptions::default()).is_json);
    }

    #[test]
    fn line_lengths_count_code_points() {
        assert_eq!(line_lengths("héllo\n日本"), vec![5, 2]);
        assert_eq!(line_lengths("a\r\nbc"), vec![1, 2]);
    }

    #[test]
    fn display_lines_are_terminal_safe() {
        let lines: Vec<_> = display_lines("a\tb\x1b[2Jc\r\nd").collect();
        assert_eq!(lines, vec!["a       b.[2Jc", "d"]);
        assert_eq!(display_line("\x07bell\rover\x7f"), ".bell.over.");
        assert_eq!(display_line("12345678\tx"), "12345678        x");
        assert_eq!(display_line("\u{9b}31m"), ".31m");

        // lengths are taken from what is shown
        assert_eq!(line_lengths("a\tb\x1b[2Jc\r\nd"), vec![14, 1]);
    }

    #[test]
    fn hex_dump_lines_and_offsets() {
        let bytes: Vec<u8> = (0u8..50).collect();
        let dump = hex_dump(&bytes);
        assert_eq!(dump.line_count(), 3);
        assert_eq!(dump.offsets, vec!["00000000", "00000018", "00000030"]);
        assert!(dump.lines[0].starts_with("00 01 02"));
        // ascii column lines up even on the short last line
        let ascii_col = HEX_DUMP_WIDTH * 3 + 1;
        assert_eq!(&dump.lines[2][ascii_col..], "01");

        assert_eq!(hex_dump(&[]).line_count(), 0);
        let text = hex_dump(b"Hi\x00");
        assert!(text.lines[0].ends_with("Hi."));
    }

    #[test]
    fn highlight_splits_keys_and_values() {
        let spans = highlight_json(r#"  "name": "ws", "n": -1.5, "ok": true"#);
        let tokens: Vec<_> = spans
            .iter()
            .filter(|s| s.token != Token::Plain)
            .map(|s| (s.token, s.text))
            .collect();
        assert_eq!(
            tokens,
            vec![
                (Token::Key, "\"name\""),
                (Token::Punctuation, ":"),
                (Token::String, "\"ws\""),
                (Token::Punctuation, ","),
                (Token::Key, "\"n\""),
                (Token::Punctuation, ":"),
                (Token::Number, "-1.5"),
                (Token::Punctuation, ","),
                (Token::Key, "\"ok\""),
                (Token::Punctuation, ":"),
                (Token::Literal, "true"),
            ]
        );
        let joined: String = spans.iter().map(|s| s.text).collect();
        assert_eq!(joined, r#"  "name": "ws", "n": -1.5, "ok": true"#);
    }

    #[test]
    fn highlight_handles_escapes_and_unterminated() {
        let spans = highlight_json(r#""a\"b" "open"#);
        assert_eq!(spans[0].text, r#""a\"b""#);
        assert_eq!(spans.last().map(|s| s.text), Some("\"open"));
    }
}
