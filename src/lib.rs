//! # ejson
//!
//! Keep secrets in JSON documents that are safe to commit. Every string value
//! is encrypted to a public key embedded in the document itself, so anyone can
//! add or change a secret, but only holders of the matching private key can
//! read them back.
//!
//! ## Quick Start
//!
//! ```bash
//! # Generate a keypair and store the private key in the keydir
//! ejson --keydir ~/.ejson/keys keygen --write
//! # prints the public key, e.g. 8d8647e2...
//!
//! cat > secrets.ejson << 'EOF'
//! {
//!   "_public_key": "8d8647e2eeb6d2e31228e6df7da3df921ec3b799c3f66a171cd37a1ed3004e7d",
//!   "database_password": "hunter2"
//! }
//! EOF
//!
//! ejson encrypt secrets.ejson
//! ejson --keydir ~/.ejson/keys decrypt secrets.ejson
//! ```
//!
//! ## How It Works
//!
//! 1. The document's `_public_key` names the recipient.
//! 2. Encryption generates an ephemeral keypair and seals each eligible value
//!    with X25519 + XSalsa20-Poly1305 under a fresh random nonce.
//! 3. Each sealed value is stored in place as a boxed message string.
//! 4. Decryption finds the private key in the key directory (a file named
//!    after the public key) or takes one supplied by the caller.
//!
//! Only string values are encrypted. Keys, numbers, booleans and nulls stay
//! readable, as does any string whose key starts with `_`. Formatting, key
//! order and whitespace survive unchanged, so encrypted files diff cleanly.
//!
//! ### Boxed Message Format
//!
//! ```text
//! EJ[1:<ephemeral public key, base64>:<nonce, base64>:<ciphertext, base64>]
//! ```
//!
//! Re-encrypting a file leaves existing boxed messages alone and only seals
//! newly added plaintext values.
//!
//! ## Module Overview
//!
//! - [`crypto`] - Keypairs, encrypters and decrypters
//! - [`boxed_message`] - Boxed message wire format
//! - [`json`] - Byte-preserving document walker and public key extraction
//! - [`key`] - Key directory lookup and private key resolution
//! - [`document`] - Whole-document and file-level encrypt/decrypt
//! - [`env`] - Shell export of a document's `environment` object
//! - [`fs`] - File access used by the file-level operations
//! - [`error`] - Error types
//!
//! ## Commands
//!
//! - `encrypt FILE...` (`e`) - Encrypt files in place
//! - `decrypt FILE [-o OUT] [--key-from-stdin] [--immediate]` (`d`) - Decrypt a file
//! - `keygen [--write]` (`g`) - Generate a keypair
//! - `env FILE [--key-from-stdin]` - Print `export` lines for the `environment` object
//!
//! The key directory defaults to `/opt/ejson/keys` and can be changed with
//! `--keydir` or `EJSON_KEYDIR`. Log output is controlled by `EJSON_LOG`
//! (for example `EJSON_LOG=ejson=debug`) or `--verbose`.
//!
//! ## Testing
//!
//! ```bash
//! # Unit tests
//! cargo test --lib
//!
//! # CLI integration tests
//! cargo test --test integration_test
//!
//! # Walker property tests
//! cargo test --test walker_proptest
//! ```

pub mod boxed_message;
pub mod crypto;
pub mod document;
pub mod env;
pub mod error;
pub mod fs;
pub mod json;
pub mod key;

// Re-export commonly used types
pub use boxed_message::{is_boxed_message, BoxedMessage};
pub use crypto::{Decrypter, Encrypter, Keypair};
pub use document::{decrypt, decrypt_file, encrypt, encrypt_file_in_place, generate_keypair, DecryptOptions};
pub use error::{EjsonError, Result};
pub use key::KeyDir;
