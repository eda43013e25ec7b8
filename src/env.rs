//! # Environment Export
//!
//! Turns the `environment` object of a decrypted document into shell
//! `export` lines:
//!
//! ```json
//! {
//!   "_public_key": "...",
//!   "environment": { "DATABASE_URL": "postgres://...", "PORT": 5432 }
//! }
//! ```
//!
//! becomes `export DATABASE_URL=postgres://...`. Entries whose value is not a
//! string (`PORT` above) are skipped.
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test env::
//! ```

use crate::document::{decrypt_file, DecryptOptions};
use crate::error::{EjsonError, Result};
use crate::fs::FileAccess;
use crate::key::KeyDir;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// Top-level field holding the variables to export.
pub const ENVIRONMENT_FIELD: &str = "environment";

/// Decrypt the document at `path` and parse the result.
pub fn read_secrets<F: FileAccess, K: FileAccess>(
    files: &F,
    path: &Path,
    keydir: &KeyDir<K>,
    private_override: Option<&str>,
) -> Result<Value> {
    let options = DecryptOptions {
        private_key: private_override.map(|key| Zeroizing::new(key.to_owned())),
        immediate: false,
    };
    let decrypted = decrypt_file(files, path, keydir, &options)?;
    Ok(serde_json::from_slice(&decrypted)?)
}

/// Collect the string entries of the document's `environment` object.
pub fn extract_env(secrets: &Value) -> Result<BTreeMap<String, String>> {
    let environment = secrets
        .get(ENVIRONMENT_FIELD)
        .ok_or(EjsonError::EnvironmentMissing)?
        .as_object()
        .ok_or(EjsonError::EnvironmentNotMap)?;

    let values: BTreeMap<String, String> = environment
        .iter()
        .filter_map(|(key, value)| Some((key.clone(), value.as_str()?.to_owned())))
        .collect();

    debug!(
        exported = values.len(),
        skipped = environment.len() - values.len(),
        "extracted environment"
    );
    Ok(values)
}

/// Write one `export KEY=VALUE` line per entry, in key order.
pub fn export_env<W: Write>(writer: &mut W, values: &BTreeMap<String, String>) -> Result<()> {
    for (key, value) in values {
        writeln!(writer, "export {key}={value}")?;
    }
    Ok(())
}
