//! Document-level encryption and decryption.
//!
//! A document is either one JSON object or an array of objects, each carrying
//! its own `_public_key`. Arrays are processed element by element: the bytes
//! of each object are walked independently and spliced back into the
//! original array, so separators and whitespace survive untouched.
//!
//! An array element whose processing fails is left as it was instead of
//! failing the whole document. That means a missing private key for one
//! element looks like "nothing to decrypt" in the output; the failure is only
//! reported through a `warn!` event.

use crate::crypto::{parse_private_key, Decrypter, Keypair, KEY_SIZE};
use crate::error::Result;
use crate::fs::FileAccess;
use crate::json::walker::escape_raw_newlines;
use crate::json::{
    extract_public_key, extract_public_key_array, split_array_objects, walk, DocumentKind,
};
use crate::key::{resolve_private_key, KeyDir};
use std::ops::Range;
use std::path::Path;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// How a document should be decrypted.
#[derive(Clone, Default)]
pub struct DecryptOptions {
    /// Hex private key to use instead of looking one up in the key directory.
    pub private_key: Option<Zeroizing<String>>,
    /// For array documents, return only the first element that decrypts.
    pub immediate: bool,
}

/// Generate a keypair, returned as `(public_hex, private_hex)`.
pub fn generate_keypair() -> Result<(String, Zeroizing<String>)> {
    let keypair = Keypair::generate()?;
    Ok((keypair.public_hex(), keypair.private_hex()))
}

/// Encrypt every encryptable value in `data` to the document's embedded
/// public key(s). Values that are already encrypted are left alone.
pub fn encrypt(data: &[u8]) -> Result<Vec<u8>> {
    let data = escape_raw_newlines(data);
    match DocumentKind::detect(&data) {
        DocumentKind::Object => {
            let public = extract_public_key(&data)?;
            debug!(public_key = %hex::encode(public), "encrypting document");
            encrypt_object(public, &data)
        }
        DocumentKind::Array => encrypt_array(&data),
    }
}

fn encrypt_object(public: [u8; KEY_SIZE], object: &[u8]) -> Result<Vec<u8>> {
    let ephemeral = Keypair::generate()?;
    let encrypter = ephemeral.encrypter(public);
    walk(object, |value| encrypter.encrypt(value))
}

fn encrypt_array(data: &[u8]) -> Result<Vec<u8>> {
    let publics = extract_public_key_array(data)?;
    let objects = split_array_objects(data)?;
    debug!(elements = objects.len(), "encrypting array document");

    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0;
    for (index, (public, range)) in publics.into_iter().zip(objects).enumerate() {
        let object = &data[range.clone()];
        out.extend_from_slice(&data[cursor..range.start]);
        match encrypt_object(public, object) {
            Ok(encrypted) => out.extend_from_slice(&encrypted),
            Err(e) => {
                warn!(element = index, error = %e, "leaving array element unencrypted");
                out.extend_from_slice(object);
            }
        }
        cursor = range.end;
    }
    out.extend_from_slice(&data[cursor..]);
    Ok(out)
}

/// Decrypt every boxed value in `data`, resolving private keys through
/// `options` and `keydir`.
pub fn decrypt<F: FileAccess>(
    data: &[u8],
    keydir: &KeyDir<F>,
    options: &DecryptOptions,
) -> Result<Vec<u8>> {
    let private_override = options.private_key.as_deref().map(String::as_str);
    if let Some(supplied) = private_override {
        parse_private_key(supplied)?;
    }

    let data = escape_raw_newlines(data);
    match DocumentKind::detect(&data) {
        DocumentKind::Object => {
            let public = extract_public_key(&data)?;
            debug!(public_key = %hex::encode(public), "decrypting document");
            decrypt_object(&public, &data, keydir, private_override)
        }
        DocumentKind::Array => decrypt_array(&data, keydir, options),
    }
}

fn decrypt_object<F: FileAccess>(
    public: &[u8; KEY_SIZE],
    object: &[u8],
    keydir: &KeyDir<F>,
    private_override: Option<&str>,
) -> Result<Vec<u8>> {
    let private = resolve_private_key(public, private_override, keydir)?;
    let decrypter = Decrypter::new(*private);
    walk(object, |value| decrypter.decrypt(value))
}

fn decrypt_array<F: FileAccess>(
    data: &[u8],
    keydir: &KeyDir<F>,
    options: &DecryptOptions,
) -> Result<Vec<u8>> {
    let publics = extract_public_key_array(data)?;
    let objects: Vec<Range<usize>> = split_array_objects(data)?;
    debug!(
        elements = objects.len(),
        immediate = options.immediate,
        "decrypting array document"
    );

    let mut out = Vec::with_capacity(data.len());
    let mut cursor = 0;
    let private_override = options.private_key.as_deref().map(String::as_str);
    for (index, (public, range)) in publics.iter().zip(objects).enumerate() {
        let object = &data[range.clone()];
        out.extend_from_slice(&data[cursor..range.start]);
        match decrypt_object(public, object, keydir, private_override) {
            Ok(mut decrypted) if options.immediate => {
                debug!(element = index, "returning first decrypted element");
                decrypted.push(b'\n');
                return Ok(decrypted);
            }
            Ok(decrypted) => out.extend_from_slice(&decrypted),
            Err(e) => {
                warn!(element = index, error = %e, "leaving array element undecrypted");
                out.extend_from_slice(object);
            }
        }
        cursor = range.end;
    }
    out.extend_from_slice(&data[cursor..]);
    Ok(out)
}

/// Encrypt the document at `path` and write it back with its original
/// permissions. Returns the number of bytes written.
pub fn encrypt_file_in_place<F: FileAccess>(files: &F, path: &Path) -> Result<usize> {
    let mode = files.mode(path)?;
    let data = files.read(path)?;

    let encrypted = encrypt(&data)?;
    files.write(path, &encrypted, Some(mode))?;

    debug!(path = %path.display(), bytes = encrypted.len(), "encrypted file in place");
    Ok(encrypted.len())
}

/// Decrypt the document at `path` and return the result.
pub fn decrypt_file<F: FileAccess, K: FileAccess>(
    files: &F,
    path: &Path,
    keydir: &KeyDir<K>,
    options: &DecryptOptions,
) -> Result<Vec<u8>> {
    let data = files.read(path)?;
    decrypt(&data, keydir, options)
}
