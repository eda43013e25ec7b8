//! # Cryptographic Operations
//!
//! Public-key authenticated encryption for individual document values.
//!
//! ## Algorithm
//!
//! - **Key agreement**: X25519 between an ephemeral private key and the
//!   document's public key
//! - **Cipher**: XSalsa20-Poly1305 (NaCl `crypto_box`)
//! - **Key size**: 256 bits (32 bytes)
//! - **Nonce size**: 192 bits (24 bytes), randomly generated per value
//!
//! Every document encryption builds its [`Encrypter`] from a freshly generated
//! ephemeral [`Keypair`]; its public half travels inside each
//! [`BoxedMessage`] so the holder of the document's private key can derive the
//! shared secret.
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test crypto::
//! ```

use crate::boxed_message::{is_boxed_message, BoxedMessage};
use crate::error::{EjsonError, Result};
use crypto_box::aead::{Aead, Nonce};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use tracing::trace;
use zeroize::Zeroizing;

pub const KEY_SIZE: usize = 32; // 256 bits
pub const NONCE_SIZE: usize = 24; // 192 bits for XSalsa20

/// An X25519 keypair. `public` is always the base-point image of `private`.
#[derive(Clone)]
pub struct Keypair {
    pub public: [u8; KEY_SIZE],
    pub private: Zeroizing<[u8; KEY_SIZE]>,
}

impl Keypair {
    /// Generate a new keypair from the OS random source.
    pub fn generate() -> Result<Self> {
        let mut private = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng
            .try_fill_bytes(&mut *private)
            .map_err(|e| EjsonError::KeyGeneration(e.to_string()))?;
        if is_zero(&*private) {
            return Err(EjsonError::KeyGeneration("random source returned a zero key".into()));
        }

        let keypair = Self::from_private(*private);
        if is_zero(&keypair.public) {
            return Err(EjsonError::KeyGeneration("derived a zero public key".into()));
        }
        Ok(keypair)
    }

    /// Rebuild a keypair from its private half.
    pub fn from_private(private: [u8; KEY_SIZE]) -> Self {
        let public = *SecretKey::from(private).public_key().as_bytes();
        Self {
            public,
            private: Zeroizing::new(private),
        }
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.public)
    }

    pub fn private_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.private))
    }

    /// Encrypter sealing values from this (ephemeral) keypair to `peer_public`.
    pub fn encrypter(&self, peer_public: [u8; KEY_SIZE]) -> Encrypter {
        Encrypter::new(self, peer_public)
    }

    /// Decrypter opening values sealed to this keypair's public key.
    pub fn decrypter(&self) -> Decrypter {
        Decrypter {
            secret: SecretKey::from(*self.private),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_hex())
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Seals plaintext values into schema 1 boxed messages.
pub struct Encrypter {
    public: [u8; KEY_SIZE],
    salsa_box: SalsaBox,
}

impl Encrypter {
    pub fn new(ephemeral: &Keypair, peer_public: [u8; KEY_SIZE]) -> Self {
        let secret = SecretKey::from(*ephemeral.private);
        Self {
            public: ephemeral.public,
            salsa_box: SalsaBox::new(&PublicKey::from(peer_public), &secret),
        }
    }

    /// Encrypt `plaintext`. Values that already look like boxed messages are
    /// returned unchanged, so re-encrypting a document never double-wraps.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if is_boxed_message(plaintext) {
            trace!("value already boxed, leaving as is");
            return Ok(plaintext.to_vec());
        }

        let nonce = generate_nonce()?;
        let ciphertext = self
            .salsa_box
            .encrypt(Nonce::<SalsaBox>::from_slice(&nonce), plaintext)
            .map_err(|e| EjsonError::Encryption(e.to_string()))?;

        trace!(plaintext_len = plaintext.len(), "sealed value");
        Ok(BoxedMessage::new(self.public, nonce, ciphertext).dump())
    }
}

/// Opens boxed messages addressed to one private key.
pub struct Decrypter {
    secret: SecretKey,
}

impl Decrypter {
    pub fn new(private: [u8; KEY_SIZE]) -> Self {
        Self {
            secret: SecretKey::from(private),
        }
    }

    /// Decrypt `value`. Anything that is not a boxed message passes through
    /// unchanged; schema 0 markers yield their raw payload.
    pub fn decrypt(&self, value: &[u8]) -> Result<Vec<u8>> {
        if !is_boxed_message(value) {
            return Ok(value.to_vec());
        }

        let message = BoxedMessage::load(value)?;
        if !message.is_encrypted() {
            return Ok(message.ciphertext);
        }

        let salsa_box = SalsaBox::new(&PublicKey::from(message.encrypter_public), &self.secret);
        let plaintext = salsa_box
            .decrypt(
                Nonce::<SalsaBox>::from_slice(&message.nonce),
                message.ciphertext.as_slice(),
            )
            .map_err(|_| EjsonError::Decryption)?;

        trace!(plaintext_len = plaintext.len(), "opened value");
        Ok(plaintext)
    }
}

/// 24 bytes from the OS random source.
pub fn generate_nonce() -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| EjsonError::KeyGeneration(format!("nonce: {e}")))?;
    Ok(nonce)
}

/// Parse a hex-encoded public key.
pub fn parse_public_key(hex_key: &str) -> Result<[u8; KEY_SIZE]> {
    decode_key(hex_key)
        .map(|key| *key)
        .ok_or(EjsonError::InvalidPublicKey)
}

/// Parse a hex-encoded private key.
pub fn parse_private_key(hex_key: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    decode_key(hex_key).ok_or(EjsonError::InvalidPrivateKey)
}

fn decode_key(hex_key: &str) -> Option<Zeroizing<[u8; KEY_SIZE]>> {
    let bytes = Zeroizing::new(hex::decode(hex_key.trim()).ok()?);
    let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().ok()?;
    Some(Zeroizing::new(key))
}

fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}
