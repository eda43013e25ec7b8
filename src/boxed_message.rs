//! # Boxed Message Codec
//!
//! Wire representation of one encrypted value as it appears inside a JSON
//! string:
//!
//! ```text
//! EJ[0:<raw bytes>]                                   explicit cleartext marker
//! EJ[1:<b64 ephemeral pk>:<b64 nonce>:<b64 box>]      encrypted value
//! EJ[2:<b64 ephemeral pk>:<b64 nonce>:<b64 box>:<hex identity>]
//! ```
//!
//! Schema 2 is reserved: its identity field is parsed and emitted but nothing
//! verifies it.

use crate::crypto::{KEY_SIZE, NONCE_SIZE};
use crate::error::{EjsonError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const PREFIX: &[u8] = b"EJ[";
const SUFFIX: &[u8] = b"]";
const DELIMITER: u8 = b':';

/// Schema version written by [`crate::crypto::Encrypter`].
pub const CURRENT_SCHEMA: u8 = 1;

/// One boxed value. For schema 0 `ciphertext` holds the raw cleartext and the
/// key and nonce are zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxedMessage {
    pub schema_version: u8,
    pub encrypter_public: [u8; KEY_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub identity: Option<Vec<u8>>,
}

impl BoxedMessage {
    /// A schema 1 message.
    pub fn new(encrypter_public: [u8; KEY_SIZE], nonce: [u8; NONCE_SIZE], ciphertext: Vec<u8>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA,
            encrypter_public,
            nonce,
            ciphertext,
            identity: None,
        }
    }

    /// A schema 0 marker carrying `raw` in cleartext.
    pub fn unencrypted(raw: &[u8]) -> Self {
        Self {
            schema_version: 0,
            encrypter_public: [0u8; KEY_SIZE],
            nonce: [0u8; NONCE_SIZE],
            ciphertext: raw.to_vec(),
            identity: None,
        }
    }

    /// Whether the payload is actually sealed (every schema but 0).
    pub fn is_encrypted(&self) -> bool {
        self.schema_version != 0
    }

    /// Serialize to the textual wire form of the declared schema version.
    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREFIX.len() + 2 + self.ciphertext.len() * 2 + 80);
        out.extend_from_slice(PREFIX);
        out.extend_from_slice(self.schema_version.to_string().as_bytes());
        out.push(DELIMITER);

        if self.schema_version == 0 {
            out.extend_from_slice(&self.ciphertext);
            out.extend_from_slice(SUFFIX);
            return out;
        }

        out.extend_from_slice(STANDARD.encode(self.encrypter_public).as_bytes());
        out.push(DELIMITER);
        out.extend_from_slice(STANDARD.encode(self.nonce).as_bytes());
        out.push(DELIMITER);
        out.extend_from_slice(STANDARD.encode(&self.ciphertext).as_bytes());

        if self.schema_version == 2 {
            out.push(DELIMITER);
            let identity = self.identity.as_deref().unwrap_or_default();
            out.extend_from_slice(hex::encode(identity).as_bytes());
        }

        out.extend_from_slice(SUFFIX);
        out
    }

    /// Parse a wire string, validating field count and per-field encoding
    /// for the declared schema version.
    pub fn load(wire: &[u8]) -> Result<Self> {
        let inner = wire
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or_else(|| invalid("missing EJ[...] envelope"))?;

        let split = inner
            .iter()
            .position(|&b| b == DELIMITER)
            .ok_or_else(|| invalid("missing schema version delimiter"))?;
        let (version, rest) = (&inner[..split], &inner[split + 1..]);
        let schema_version = parse_version(version)?;

        if schema_version == 0 {
            return Ok(Self::unencrypted(rest));
        }

        let fields: Vec<&[u8]> = rest.split(|&b| b == DELIMITER).collect();
        let expected = match schema_version {
            1 => 3,
            2 => 4,
            other => return Err(invalid(format!("unsupported schema version {other}"))),
        };
        if fields.len() != expected {
            return Err(invalid(format!(
                "schema {schema_version} expects {expected} fields, found {}",
                fields.len()
            )));
        }

        let encrypter_public = decode_fixed::<KEY_SIZE>(fields[0], "encrypter public key")?;
        let nonce = decode_fixed::<NONCE_SIZE>(fields[1], "nonce")?;
        let ciphertext = STANDARD
            .decode(fields[2])
            .map_err(|e| invalid(format!("box: {e}")))?;

        let identity = match fields.get(3) {
            Some(field) if field.is_empty() => return Err(invalid("empty identity")),
            Some(field) => Some(hex::decode(field).map_err(|e| invalid(format!("identity: {e}")))?),
            None => None,
        };

        Ok(Self {
            schema_version,
            encrypter_public,
            nonce,
            ciphertext,
            identity,
        })
    }
}

/// Cheap format sniff: `EJ[<digit>:...]` with at least the delimiter count the
/// schema needs. Field encodings are not checked.
pub fn is_boxed_message(data: &[u8]) -> bool {
    let Some(inner) = data
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
    else {
        return false;
    };
    let [version, DELIMITER, ..] = inner else {
        return false;
    };
    if !version.is_ascii_digit() {
        return false;
    }

    let min_delimiters = match version - b'0' {
        0 => 1,
        2 => 4,
        _ => 3,
    };
    inner.iter().filter(|&&b| b == DELIMITER).count() >= min_delimiters
}

fn parse_version(field: &[u8]) -> Result<u8> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(invalid("schema version is not a number"));
    }
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| invalid("schema version out of range"))
}

fn decode_fixed<const N: usize>(field: &[u8], what: &str) -> Result<[u8; N]> {
    let bytes = STANDARD
        .decode(field)
        .map_err(|e| invalid(format!("{what}: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("{what}: expected {N} bytes, found {}", b.len())))
}

fn invalid(msg: impl Into<String>) -> EjsonError {
    EjsonError::InvalidBoxedMessage(msg.into())
}
