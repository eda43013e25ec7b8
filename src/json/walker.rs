//! Byte-preserving walk over a JSON document.
//!
//! Reserializing through a parsed value would reorder keys and reformat
//! whitespace, wrecking diffs of committed secrets files. Instead the
//! [`Scanner`] makes one forward pass and reports every byte of the input as
//! part of exactly one [`Span`]; [`walk`] copies all spans verbatim except
//! encryptable string values, which go through the caller's action.
//!
//! A string value is encryptable unless the key that owns it begins with `_`.
//! Exclusion does not inherit:
//!
//! * `{"_a": "b"}` leaves `"b"` alone.
//! * `{"_a": ["b", "c"]}` leaves both elements alone.
//! * `{"_a": {"b": "c"}}` transforms `"c"`, whose own key is `b`.
//! * `{"a": {"_b": "c"}}` leaves `"c"` alone.

use crate::error::{EjsonError, Result};
use std::borrow::Cow;
use std::ops::Range;

/// Classification of one contiguous run of input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Whitespace or punctuation.
    Raw,
    /// An object key, quotes included.
    Key,
    /// A scalar value. `encryptable` is set for string values whose owning
    /// key is not underscore-prefixed.
    Value { encryptable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// One open container. `excluded` applies to scalar values directly inside
/// it: for objects it tracks the most recent key, for arrays it is fixed by
/// the key that introduced the array.
#[derive(Debug, Clone, Copy)]
struct Frame {
    container: Container,
    excluded: bool,
}

/// What the grammar allows next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrArrayEnd,
    KeyOrObjectEnd,
    Key,
    Colon,
    CommaOrEnd,
    Done,
}

/// Validating single-pass tokenizer over raw JSON bytes.
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    stack: Vec<Frame>,
    expect: Expect,
}

impl<'a> Scanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            stack: Vec::new(),
            expect: Expect::Value,
        }
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Next span, or `None` once the input is exhausted after a complete
    /// top-level value.
    pub fn next_span(&mut self) -> Result<Option<(Span, Range<usize>)>> {
        let start = self.pos;
        let Some(&c) = self.data.get(start) else {
            return match self.expect {
                Expect::Done => Ok(None),
                _ => Err(invalid("unexpected end of JSON input")),
            };
        };

        if is_space(c) {
            let len = self.data[start..].iter().take_while(|&&b| is_space(b)).count();
            return Ok(Some(self.emit(Span::Raw, len)));
        }

        match (self.expect, c) {
            (Expect::Key | Expect::KeyOrObjectEnd, b'"') => {
                let len = self.string_len(start)?;
                let excluded = self.data.get(start + 1) == Some(&b'_');
                if let Some(frame) = self.stack.last_mut() {
                    frame.excluded = excluded;
                }
                self.expect = Expect::Colon;
                Ok(Some(self.emit(Span::Key, len)))
            }
            (Expect::Colon, b':') => {
                self.expect = Expect::Value;
                Ok(Some(self.emit(Span::Raw, 1)))
            }
            (Expect::CommaOrEnd, b',') => {
                self.expect = match self.top() {
                    Some(Container::Object) => Expect::Key,
                    _ => Expect::Value,
                };
                Ok(Some(self.emit(Span::Raw, 1)))
            }
            (Expect::KeyOrObjectEnd, b'}') => self.close(),
            (Expect::CommaOrEnd, b'}') if self.top() == Some(Container::Object) => self.close(),
            (Expect::ValueOrArrayEnd, b']') => self.close(),
            (Expect::CommaOrEnd, b']') if self.top() == Some(Container::Array) => self.close(),
            (Expect::Value | Expect::ValueOrArrayEnd, b'{') => {
                self.stack.push(Frame {
                    container: Container::Object,
                    excluded: false,
                });
                self.expect = Expect::KeyOrObjectEnd;
                Ok(Some(self.emit(Span::Raw, 1)))
            }
            (Expect::Value | Expect::ValueOrArrayEnd, b'[') => {
                let excluded = self.excluded();
                self.stack.push(Frame {
                    container: Container::Array,
                    excluded,
                });
                self.expect = Expect::ValueOrArrayEnd;
                Ok(Some(self.emit(Span::Raw, 1)))
            }
            (Expect::Value | Expect::ValueOrArrayEnd, b'"') => {
                let len = self.string_len(start)?;
                let encryptable = !self.excluded();
                self.value_done();
                Ok(Some(self.emit(Span::Value { encryptable }, len)))
            }
            (Expect::Value | Expect::ValueOrArrayEnd, b'-' | b'0'..=b'9') => {
                let len = self.number_len(start)?;
                self.value_done();
                Ok(Some(self.emit(Span::Value { encryptable: false }, len)))
            }
            (Expect::Value | Expect::ValueOrArrayEnd, b't' | b'f' | b'n') => {
                let word: &[u8] = match c {
                    b't' => b"true",
                    b'f' => b"false",
                    _ => b"null",
                };
                if !self.data[start..].starts_with(word) {
                    return Err(self.unexpected(start));
                }
                self.value_done();
                Ok(Some(self.emit(Span::Value { encryptable: false }, word.len())))
            }
            _ => Err(self.unexpected(start)),
        }
    }

    fn emit(&mut self, span: Span, len: usize) -> (Span, Range<usize>) {
        let range = self.pos..self.pos + len;
        self.pos += len;
        (span, range)
    }

    fn close(&mut self) -> Result<Option<(Span, Range<usize>)>> {
        self.stack.pop();
        self.value_done();
        Ok(Some(self.emit(Span::Raw, 1)))
    }

    fn value_done(&mut self) {
        self.expect = if self.stack.is_empty() {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }

    fn top(&self) -> Option<Container> {
        self.stack.last().map(|frame| frame.container)
    }

    fn excluded(&self) -> bool {
        self.stack.last().is_some_and(|frame| frame.excluded)
    }

    fn unexpected(&self, at: usize) -> EjsonError {
        let context = match self.expect {
            Expect::Done => "after top-level value",
            Expect::Colon => "after object key",
            Expect::CommaOrEnd => "after value",
            Expect::Key | Expect::KeyOrObjectEnd => "looking for object key",
            Expect::Value | Expect::ValueOrArrayEnd => "looking for beginning of value",
        };
        invalid(format!(
            "invalid character {:?} at offset {at} {context}",
            char::from(self.data[at])
        ))
    }

    /// Length of the string literal starting at `start`, quotes included.
    fn string_len(&self, start: usize) -> Result<usize> {
        let mut i = start + 1;
        loop {
            let Some(&c) = self.data.get(i) else {
                return Err(invalid("unexpected end of JSON input in string literal"));
            };
            match c {
                b'"' => return Ok(i + 1 - start),
                b'\\' => {
                    match self.data.get(i + 1) {
                        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => i += 2,
                        Some(b'u') => {
                            let digits = self.data.get(i + 2..i + 6).ok_or_else(|| {
                                invalid("unexpected end of JSON input in string escape")
                            })?;
                            if !digits.iter().all(u8::is_ascii_hexdigit) {
                                return Err(invalid(format!("invalid unicode escape at offset {i}")));
                            }
                            i += 6;
                        }
                        Some(_) => return Err(invalid(format!("invalid escape at offset {i}"))),
                        None => return Err(invalid("unexpected end of JSON input in string escape")),
                    }
                }
                c if c < 0x20 => {
                    return Err(invalid(format!("control character in string literal at offset {i}")))
                }
                _ => i += 1,
            }
        }
    }

    /// Length of the number literal starting at `start`.
    fn number_len(&self, start: usize) -> Result<usize> {
        let data = self.data;
        let digits_from = |i: usize| data[i..].iter().take_while(|b| b.is_ascii_digit()).count();

        let mut i = start;
        if data[i] == b'-' {
            i += 1;
        }
        match data.get(i) {
            Some(b'0') => i += 1,
            Some(b'1'..=b'9') => i += digits_from(i),
            _ => return Err(invalid(format!("invalid number at offset {start}"))),
        }
        if data.get(i) == Some(&b'.') {
            let n = digits_from(i + 1);
            if n == 0 {
                return Err(invalid(format!("invalid number at offset {start}")));
            }
            i += 1 + n;
        }
        if matches!(data.get(i), Some(b'e' | b'E')) {
            i += 1;
            if matches!(data.get(i), Some(b'+' | b'-')) {
                i += 1;
            }
            let n = digits_from(i);
            if n == 0 {
                return Err(invalid(format!("invalid number at offset {start}")));
            }
            i += n;
        }
        Ok(i - start)
    }
}

/// Walk `data`, replacing every encryptable string value with the result of
/// `action` applied to its unquoted contents. All other bytes are copied
/// unchanged. Errors from `action` propagate as-is.
pub fn walk<F>(data: &[u8], mut action: F) -> Result<Vec<u8>>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    let data = escape_raw_newlines(data);
    let mut scanner = Scanner::new(&data);
    let mut out = Vec::with_capacity(data.len());

    while let Some((span, range)) = scanner.next_span()? {
        let literal = &data[range];
        match span {
            Span::Value { encryptable: true } => {
                let unquoted = unquote(literal)?;
                let done = action(&unquoted)?;
                out.extend_from_slice(&quote(&done)?);
            }
            _ => out.extend_from_slice(literal),
        }
    }

    Ok(out)
}

/// Replace raw CR and LF bytes inside string literals with their two-byte
/// escapes. Bytes outside string literals are untouched.
pub fn escape_raw_newlines(data: &[u8]) -> Cow<'_, [u8]> {
    let mut in_string = false;
    let mut escaped = false;
    let mut needs_rewrite = false;
    for &c in data {
        if in_string {
            if c == b'\n' || c == b'\r' {
                needs_rewrite = true;
                break;
            } else if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
        } else if c == b'"' {
            in_string = true;
        }
    }
    if !needs_rewrite {
        return Cow::Borrowed(data);
    }

    let mut out = Vec::with_capacity(data.len() + 16);
    in_string = false;
    escaped = false;
    for &c in data {
        if in_string {
            match c {
                b'\n' | b'\r' if escaped => {
                    // a backslash followed by a raw newline: keep the
                    // backslash literal and escape the newline
                    out.push(b'\\');
                    out.extend_from_slice(newline_escape(c));
                    escaped = false;
                }
                b'\n' | b'\r' => out.extend_from_slice(newline_escape(c)),
                _ if escaped => {
                    out.push(c);
                    escaped = false;
                }
                b'\\' => {
                    out.push(c);
                    escaped = true;
                }
                b'"' => {
                    out.push(c);
                    in_string = false;
                }
                _ => out.push(c),
            }
        } else {
            if c == b'"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn newline_escape(c: u8) -> &'static [u8] {
    if c == b'\n' {
        b"\\n"
    } else {
        b"\\r"
    }
}

/// Decode a string literal (quotes included) that the scanner accepted. Lone
/// UTF-16 surrogate escapes decode to U+FFFD instead of failing.
pub(crate) fn unquote(literal: &[u8]) -> Result<Vec<u8>> {
    let body = literal
        .strip_prefix(b"\"")
        .and_then(|rest| rest.strip_suffix(b"\""))
        .ok_or_else(|| invalid("string literal is not quoted"))?;
    if !body.contains(&b'\\') {
        return Ok(body.to_vec());
    }

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while let Some(&c) = body.get(i) {
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }
        let decoded = match body.get(i + 1) {
            Some(b'"') => b'"',
            Some(b'\\') => b'\\',
            Some(b'/') => b'/',
            Some(b'b') => 0x08,
            Some(b'f') => 0x0c,
            Some(b'n') => b'\n',
            Some(b'r') => b'\r',
            Some(b't') => b'\t',
            Some(b'u') => {
                let (ch, used) = unicode_escape(&body[i + 2..])
                    .ok_or_else(|| invalid(format!("invalid unicode escape at offset {i}")))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                i += 2 + used;
                continue;
            }
            _ => return Err(invalid(format!("invalid escape at offset {i}"))),
        };
        out.push(decoded);
        i += 2;
    }
    Ok(out)
}

/// Decode the hex digits following `\u`, joining a surrogate pair when the
/// next escape completes it. Returns the char and the bytes consumed.
fn unicode_escape(rest: &[u8]) -> Option<(char, usize)> {
    let unit = hex4(rest)?;
    if !(0xD800..=0xDFFF).contains(&unit) {
        return Some((char::from_u32(unit)?, 4));
    }
    if unit < 0xDC00 && rest.get(4..6) == Some(b"\\u".as_slice()) {
        if let Some(low @ 0xDC00..=0xDFFF) = rest.get(6..).and_then(hex4) {
            let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
            return Some((char::from_u32(code)?, 10));
        }
    }
    Some((char::REPLACEMENT_CHARACTER, 4))
}

fn hex4(data: &[u8]) -> Option<u32> {
    let digits = data.get(..4)?;
    digits.iter().try_fold(0u32, |acc, &d| {
        Some(acc * 16 + char::from(d).to_digit(16)?)
    })
}

fn quote(raw: &[u8]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&String::from_utf8_lossy(raw))?)
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

fn invalid(msg: impl Into<String>) -> EjsonError {
    EjsonError::InvalidJson(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_all(input: &str) -> String {
        let out = walk(input.as_bytes(), |_| Ok(b"E".to_vec())).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_walker_cases() {
        // "E" means encrypted.
        let cases = [
            (r#"{"a": "b"}"#, r#"{"a": "E"}"#),
            (r#"{"a" : "b"}"#, r#"{"a" : "E"}"#),
            (r#" {  "a"  :"b" } "#, r#" {  "a"  :"E" } "#),
            (r#"{"_a": "b"}"#, r#"{"_a": "b"}"#),
            (r#"{"a": "b", "c": "d"}"#, r#"{"a": "E", "c": "E"}"#),
            (r#"{"a": 1}"#, r#"{"a": 1}"#),
            (r#"{"a": true}"#, r#"{"a": true}"#),
            (r#"{"a": null, "b": false}"#, r#"{"a": null, "b": false}"#),
            (r#"{"a": ["b", "c"]}"#, r#"{"a": ["E", "E"]}"#),
            (r#"{"_a": ["b", "c"]}"#, r#"{"_a": ["b", "c"]}"#),
            (r#"{"a": {"b": "c"}}"#, r#"{"a": {"b": "E"}}"#),
            (r#"{"a": {"_b": "c"}}"#, r#"{"a": {"_b": "c"}}"#),
            (r#"{"_a": {"b": "c"}}"#, r#"{"_a": {"b": "E"}}"#),
            (r#"{"_a": [{"b": "c"}]}"#, r#"{"_a": [{"b": "E"}]}"#),
        ];
        for (input, expected) in cases {
            assert_eq!(encrypt_all(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_exclusion_restored_after_nested_object() {
        let input = r#"{"a": ["b", {"_c": "d"}, "e"]}"#;
        assert_eq!(encrypt_all(input), r#"{"a": ["E", {"_c": "d"}, "E"]}"#);

        let input = r#"{"_a": ["b", {"c": "d"}, "e"]}"#;
        assert_eq!(encrypt_all(input), r#"{"_a": ["b", {"c": "E"}, "e"]}"#);
    }

    #[test]
    fn test_preserves_formatting() {
        let input = "{\n  \"_public_key\": \"abc\",\n\t\"n\": -1.5e+3,\n  \"s\": \"x\"\n}\n";
        let expected = "{\n  \"_public_key\": \"abc\",\n\t\"n\": -1.5e+3,\n  \"s\": \"E\"\n}\n";
        assert_eq!(encrypt_all(input), expected);
    }

    #[test]
    fn test_action_receives_unquoted_value() {
        let mut seen = Vec::new();
        walk(br#"{"a": "line\nwith \"quotes\" \u00e9"}"#, |v| {
            seen.push(String::from_utf8(v.to_vec()).unwrap());
            Ok(v.to_vec())
        })
        .unwrap();
        assert_eq!(seen, vec!["line\nwith \"quotes\" é".to_string()]);
    }

    #[test]
    fn test_lone_surrogates_decode_to_replacement_char() {
        let mut seen = Vec::new();
        walk(br#"{"a": "\ud800", "b": "x\udc00y\ud83d"}"#, |v| {
            seen.push(String::from_utf8(v.to_vec()).unwrap());
            Ok(v.to_vec())
        })
        .unwrap();
        assert_eq!(seen, vec!["\u{fffd}", "x\u{fffd}y\u{fffd}"]);
    }

    #[test]
    fn test_surrogate_pairs_join() {
        let mut seen = Vec::new();
        walk(br#"{"a": "\ud83d\ude00", "b": "\ud83dA"}"#, |v| {
            seen.push(String::from_utf8(v.to_vec()).unwrap());
            Ok(v.to_vec())
        })
        .unwrap();
        assert_eq!(seen, vec!["\u{1f600}", "\u{fffd}A"]);
    }

    #[test]
    fn test_excluded_lone_surrogate_is_copied() {
        let input = r#"{"_a": "\ud800", "b": "c"}"#;
        assert_eq!(encrypt_all(input), r#"{"_a": "\ud800", "b": "E"}"#);
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(br#""plain""#).unwrap(), b"plain");
        assert_eq!(
            unquote(br#""\"\\\/\b\f\n\r\tA""#).unwrap(),
            b"\"\\/\x08\x0c\n\r\tA"
        );
        assert!(unquote(b"unquoted").is_err());
    }

    #[test]
    fn test_action_output_is_requoted() {
        let out = walk(br#"{"a": "b"}"#, |_| Ok(b"say \"hi\"\n".to_vec())).unwrap();
        assert_eq!(out, br#"{"a": "say \"hi\"\n"}"#);
    }

    #[test]
    fn test_action_error_propagates() {
        let err = walk(br#"{"a": "b"}"#, |_| Err(EjsonError::Decryption)).unwrap_err();
        assert!(matches!(err, EjsonError::Decryption));
    }

    #[test]
    fn test_keys_never_transformed() {
        let mut calls = 0;
        walk(br#"{"a": {"b": 1}, "c": [1, 2]}"#, |v| {
            calls += 1;
            Ok(v.to_vec())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_top_level_array_and_scalars() {
        assert_eq!(encrypt_all(r#"["a", 1, "b"]"#), r#"["E", 1, "E"]"#);
        assert_eq!(encrypt_all(r#""a""#), r#""E""#);
        assert_eq!(encrypt_all("42"), "42");
    }

    #[test]
    fn test_raw_newlines_in_strings_are_escaped() {
        let input = "{\"_a\": \"x\ny\r\"}";
        assert_eq!(encrypt_all(input), "{\"_a\": \"x\\ny\\r\"}");

        let mut seen = Vec::new();
        walk(b"{\"a\": \"one\ntwo\"}", |v| {
            seen.push(v.to_vec());
            Ok(v.to_vec())
        })
        .unwrap();
        assert_eq!(seen, vec![b"one\ntwo".to_vec()]);
    }

    #[test]
    fn test_escape_raw_newlines_borrows_when_clean() {
        let data = b"{\n\"a\": \"b\"\n}";
        assert!(matches!(escape_raw_newlines(data), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_raw_newlines_ignores_escaped_quotes() {
        let out = escape_raw_newlines(b"[\"a\\\"\nb\"]");
        assert_eq!(&*out, b"[\"a\\\"\\nb\"]");
    }

    #[test]
    fn test_invalid_json() {
        let bad = [
            r#"{"a": "b"]"#,
            r#"{"a": "b""#,
            r#"{"a" "b"}"#,
            r#"{"a": }"#,
            r#"{"a": "b",}"#,
            r#"{a: "b"}"#,
            r#"{"a": tru}"#,
            r#"{"a": 01}"#,
            r#"{"a": 1.}"#,
            r#"{"a": "\x"}"#,
            r#"{"a": "\u12"}"#,
            r#"{"a": "b"} {}"#,
            r#"["a",]"#,
            "",
            "   ",
            "{\"a\": \"b\u{1}\"}",
        ];
        for input in bad {
            let err = walk(input.as_bytes(), |v| Ok(v.to_vec())).unwrap_err();
            assert!(
                matches!(err, EjsonError::InvalidJson(_)),
                "expected invalid json for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_scanner_spans_cover_input() {
        let input = br#" {"a": [1, "x", {"_b": null}], "c": "d"} "#;
        let mut scanner = Scanner::new(input);
        let mut covered = 0;
        let mut spans = Vec::new();
        while let Some((span, range)) = scanner.next_span().unwrap() {
            assert_eq!(range.start, covered);
            covered = range.end;
            spans.push(span);
        }
        assert_eq!(covered, input.len());
        assert_eq!(
            spans.iter().filter(|s| **s == Span::Key).count(),
            3,
            "three keys"
        );
        assert!(spans.contains(&Span::Value { encryptable: true }));
        assert_eq!(scanner.depth(), 0);
    }

    #[test]
    fn test_scanner_depth_tracking() {
        let mut scanner = Scanner::new(b"[{}]");
        let mut depths = Vec::new();
        while scanner.next_span().unwrap().is_some() {
            depths.push(scanner.depth());
        }
        assert_eq!(depths, vec![1, 2, 1, 0]);
    }
}
