//! # Key Management
//!
//! Private keys live in a key directory, one file per keypair:
//!
//! - **File name**: the 64-character hex public key
//! - **Contents**: the 64-character hex private key, optionally surrounded by
//!   whitespace
//! - **Permissions**: 0440 on Unix when written by `keygen --write`
//!
//! Decryption resolves the document's public key to a private key either from
//! a caller-supplied override (for example a key piped on stdin) or from the
//! key directory.
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test key::
//! ```

use crate::crypto::{parse_private_key, Keypair, KEY_SIZE};
use crate::error::{EjsonError, Result};
use crate::fs::{FileAccess, OsFiles};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Key directory used when neither `--keydir` nor `EJSON_KEYDIR` is set.
pub const DEFAULT_KEYDIR: &str = "/opt/ejson/keys";

/// Environment variable overriding the key directory.
pub const KEYDIR_ENV: &str = "EJSON_KEYDIR";

/// Permissions given to private key files written into the key directory.
pub const KEY_FILE_MODE: u32 = 0o440;

/// Directory-backed store mapping public keys to private keys.
pub struct KeyDir<F = OsFiles> {
    dir: PathBuf,
    files: F,
}

impl KeyDir<OsFiles> {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_files(dir, OsFiles)
    }
}

impl<F: FileAccess> KeyDir<F> {
    pub fn with_files(dir: impl AsRef<Path>, files: F) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files,
        }
    }

    /// Get the key directory path
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding the private key for `public`.
    pub fn key_path(&self, public: &[u8; KEY_SIZE]) -> PathBuf {
        self.dir.join(hex::encode(public))
    }

    /// Load the private key stored for `public`.
    pub fn find_private_key(&self, public: &[u8; KEY_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let key_path = self.key_path(public);
        debug!("Loading private key from: {}", key_path.display());

        let contents = Zeroizing::new(
            self.files
                .read(&key_path)
                .map_err(|e| EjsonError::KeyFileRead(format!("{}: {e}", key_path.display())))?,
        );

        std::str::from_utf8(&contents)
            .ok()
            .and_then(|hex_key| parse_private_key(hex_key.trim()).ok())
            .ok_or(EjsonError::InvalidKeydirKey)
    }

    /// Store the private half of `keypair` under its public key.
    pub fn write_private_key(&self, keypair: &Keypair) -> Result<PathBuf> {
        let key_path = self.dir.join(keypair.public_hex());
        self.files
            .write(&key_path, keypair.private_hex().as_bytes(), Some(KEY_FILE_MODE))?;

        debug!("Private key written to: {}", key_path.display());
        Ok(key_path)
    }
}

/// Resolve the private key for `public`. A supplied override wins over the key
/// directory; a malformed override fails before any lookup.
pub fn resolve_private_key<F: FileAccess>(
    public: &[u8; KEY_SIZE],
    private_override: Option<&str>,
    keydir: &KeyDir<F>,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let Some(supplied) = private_override else {
        return keydir.find_private_key(public);
    };

    let private = parse_private_key(supplied)?;
    if Keypair::from_private(*private).public != *public {
        warn!(
            public_key = %hex::encode(public),
            "supplied private key does not belong to the document's public key"
        );
    }
    Ok(private)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PUBLIC: &str = "8d8647e2eeb6d2e31228e6df7da3df921ec3b799c3f66a171cd37a1ed3004e7d";
    const PRIVATE: &str = "c5caa31a5b8cb2be0074b37c56775f533b368b81d8fd33b94181f79bd6e47f87";

    fn public_bytes() -> [u8; KEY_SIZE] {
        hex::decode(PUBLIC).unwrap().try_into().unwrap()
    }

    fn create_keydir() -> (TempDir, KeyDir) {
        let temp = TempDir::new().unwrap();
        let keydir = KeyDir::new(temp.path());
        (temp, keydir)
    }

    #[test]
    fn test_key_path() {
        let (temp, keydir) = create_keydir();
        assert_eq!(keydir.path(), temp.path());
        assert_eq!(keydir.key_path(&public_bytes()), temp.path().join(PUBLIC));
    }

    #[test]
    fn test_find_private_key() {
        let (temp, keydir) = create_keydir();
        fs::write(temp.path().join(PUBLIC), format!("  {PRIVATE}\n")).unwrap();

        let private = keydir.find_private_key(&public_bytes()).unwrap();
        assert_eq!(hex::encode(*private), PRIVATE);
    }

    #[test]
    fn test_find_missing_key() {
        let (_temp, keydir) = create_keydir();

        let err = keydir.find_private_key(&public_bytes()).unwrap_err();
        assert!(matches!(err, EjsonError::KeyFileRead(_)));
        assert!(err.to_string().contains("couldn't read key file"));
    }

    #[test]
    fn test_find_malformed_key() {
        let (temp, keydir) = create_keydir();
        fs::write(temp.path().join(PUBLIC), "c5caa31a").unwrap();

        let err = keydir.find_private_key(&public_bytes()).unwrap_err();
        assert!(matches!(err, EjsonError::InvalidKeydirKey));
    }

    #[test]
    fn test_override_wins() {
        let (_temp, keydir) = create_keydir();

        let private = resolve_private_key(&public_bytes(), Some(PRIVATE), &keydir).unwrap();
        assert_eq!(hex::encode(*private), PRIVATE);
    }

    #[test]
    fn test_malformed_override() {
        let (temp, keydir) = create_keydir();
        fs::write(temp.path().join(PUBLIC), PRIVATE).unwrap();

        let err = resolve_private_key(&public_bytes(), Some("abcd"), &keydir).unwrap_err();
        assert!(matches!(err, EjsonError::InvalidPrivateKey));
    }

    #[test]
    fn test_resolve_falls_back_to_keydir() {
        let (temp, keydir) = create_keydir();
        fs::write(temp.path().join(PUBLIC), PRIVATE).unwrap();

        let private = resolve_private_key(&public_bytes(), None, &keydir).unwrap();
        assert_eq!(hex::encode(*private), PRIVATE);
    }

    #[test]
    fn test_write_private_key() {
        let (_temp, keydir) = create_keydir();
        let keypair = Keypair::generate().unwrap();

        let path = keydir.write_private_key(&keypair).unwrap();
        assert_eq!(path, keydir.key_path(&keypair.public));
        assert_eq!(*keydir.find_private_key(&keypair.public).unwrap(), *keypair.private);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, KEY_FILE_MODE);
        }
    }
}
