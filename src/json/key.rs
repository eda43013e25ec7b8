//! Public key extraction and array splitting for EJSON documents.

use super::walker::{unquote, Scanner, Span};
use crate::crypto::KEY_SIZE;
use crate::error::{EjsonError, Result};
use std::ops::Range;

/// Top-level field holding the document's hex-encoded public key.
pub const PUBLIC_KEY_FIELD: &str = "_public_key";

/// Top-level shape of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Object,
    Array,
}

impl DocumentKind {
    /// Decided by the first non-whitespace byte; anything that is not an
    /// array is treated as an object and left to the parser to reject.
    pub fn detect(data: &[u8]) -> Self {
        match data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') => Self::Array,
            _ => Self::Object,
        }
    }
}

/// Parse the `_public_key` field from a single-object document.
pub fn extract_public_key(data: &[u8]) -> Result<[u8; KEY_SIZE]> {
    let mut fields = scan_public_key_fields(data, DocumentKind::Object)?;
    match fields.pop() {
        Some(field) if fields.is_empty() => public_key_from(field),
        _ => Err(EjsonError::InvalidJson("expected a single JSON object".into())),
    }
}

/// Parse the `_public_key` field of every object in an array document. Any
/// element missing or malforming the field fails the whole call.
pub fn extract_public_key_array(data: &[u8]) -> Result<Vec<[u8; KEY_SIZE]>> {
    scan_public_key_fields(data, DocumentKind::Array)?
        .into_iter()
        .map(public_key_from)
        .collect()
}

/// The `_public_key` member of one object, as found by the scanner.
#[derive(Debug, PartialEq, Eq)]
enum KeyField {
    Missing,
    String(Vec<u8>),
    NotAString,
}

/// One [`KeyField`] per object at the level `kind` expects: the document
/// itself for objects, each element for arrays. Only `_public_key` members
/// are decoded; every other value is just validated by the scanner, so
/// nesting depth and string contents elsewhere never matter.
fn scan_public_key_fields(data: &[u8], kind: DocumentKind) -> Result<Vec<KeyField>> {
    let object_depth = match kind {
        DocumentKind::Object => 1,
        DocumentKind::Array => 2,
    };
    let mut scanner = Scanner::new(data);
    let mut fields = Vec::new();
    let mut at_public_key = false;

    while let Some((span, range)) = scanner.next_span()? {
        let depth = scanner.depth();
        let literal = &data[range];
        match span {
            Span::Key if depth == object_depth => {
                at_public_key = unquote(literal)? == PUBLIC_KEY_FIELD.as_bytes();
            }
            Span::Value { .. } if depth == object_depth && at_public_key => {
                let field = match literal.first() {
                    Some(b'"') => KeyField::String(unquote(literal)?),
                    _ => KeyField::NotAString,
                };
                set_field(&mut fields, field);
                at_public_key = false;
            }
            Span::Value { .. } if depth < object_depth => return Err(not_an_object(kind)),
            Span::Raw => match (literal.first(), depth) {
                (Some(b'{'), d) if d == object_depth => fields.push(KeyField::Missing),
                (Some(b'['), d) if d == object_depth => return Err(not_an_object(kind)),
                (Some(b'{' | b'['), d) if d == object_depth + 1 && at_public_key => {
                    set_field(&mut fields, KeyField::NotAString);
                    at_public_key = false;
                }
                (Some(b'{'), 1) if kind == DocumentKind::Array => {
                    return Err(not_an_object(kind))
                }
                _ => {}
            },
            _ => {}
        }
    }

    Ok(fields)
}

fn set_field(fields: &mut [KeyField], field: KeyField) {
    if let Some(last) = fields.last_mut() {
        *last = field;
    }
}

fn not_an_object(kind: DocumentKind) -> EjsonError {
    let expected = match kind {
        DocumentKind::Object => "a JSON object",
        DocumentKind::Array => "an array of JSON objects",
    };
    EjsonError::InvalidJson(format!("expected {expected}"))
}

fn public_key_from(field: KeyField) -> Result<[u8; KEY_SIZE]> {
    let hex_key = match field {
        KeyField::Missing => return Err(EjsonError::PublicKeyMissing),
        KeyField::NotAString => return Err(EjsonError::PublicKeyInvalid),
        KeyField::String(hex_key) => hex_key,
    };
    if hex_key.len() != KEY_SIZE * 2 {
        return Err(EjsonError::PublicKeyInvalid);
    }
    hex::decode(hex_key)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(EjsonError::PublicKeyInvalid)
}

/// Byte ranges of each top-level object in an array document, braces
/// included. Matching follows the document structure, so braces inside
/// string values do not confuse it.
pub fn split_array_objects(data: &[u8]) -> Result<Vec<Range<usize>>> {
    let mut scanner = Scanner::new(data);
    let mut objects = Vec::new();
    let mut open = None;

    while let Some((span, range)) = scanner.next_span()? {
        if span != Span::Raw {
            continue;
        }
        match (data[range.start], scanner.depth()) {
            (b'{', 2) => open = Some(range.start),
            (b'}', 1) => {
                if let Some(start) = open.take() {
                    objects.push(start..range.end);
                }
            }
            _ => {}
        }
    }

    Ok(objects)
}
