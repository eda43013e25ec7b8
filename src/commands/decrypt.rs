use super::read_key_from_stdin;
use anyhow::{Context, Result};
use ejson::document::{decrypt_file, DecryptOptions};
use ejson::fs::{FileAccess, OsFiles};
use ejson::key::KeyDir;
use std::io::{self, Write};
use std::path::Path;

/// Decrypt a file to stdout, or to `output` when given
pub fn decrypt(
    path: &Path,
    output: Option<&Path>,
    keydir: &Path,
    key_from_stdin: bool,
    immediate: bool,
) -> Result<()> {
    let private_key = key_from_stdin.then(read_key_from_stdin).transpose()?;
    let options = DecryptOptions {
        private_key,
        immediate,
    };

    let decrypted = decrypt_file(&OsFiles, path, &KeyDir::new(keydir), &options)
        .with_context(|| format!("Decryption failed for {}", path.display()))?;

    match output {
        Some(out) => OsFiles
            .write(out, &decrypted, None)
            .with_context(|| format!("Failed to write {}", out.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&decrypted)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
