use anyhow::{Context, Result};
use ejson::document::encrypt_file_in_place;
use ejson::fs::OsFiles;
use std::path::PathBuf;

/// Encrypt each file in place, stopping at the first failure
pub fn encrypt(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let written = encrypt_file_in_place(&OsFiles, path)
            .with_context(|| format!("Encryption failed for {}", path.display()))?;
        println!("Wrote {written} bytes to {}.", path.display());
    }

    Ok(())
}
