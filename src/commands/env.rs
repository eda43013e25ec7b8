use super::read_key_from_stdin;
use anyhow::{Context, Result};
use ejson::env::{export_env, extract_env, read_secrets};
use ejson::fs::OsFiles;
use ejson::key::KeyDir;
use std::io;
use std::path::Path;

/// Print the document's `environment` entries as shell exports
pub fn env(path: &Path, keydir: &Path, key_from_stdin: bool) -> Result<()> {
    let private_key = key_from_stdin.then(read_key_from_stdin).transpose()?;

    let private_key = private_key.as_deref().map(String::as_str);

    let secrets = read_secrets(&OsFiles, path, &KeyDir::new(keydir), private_key)
        .context("could not load ejson file")?;
    let values = extract_env(&secrets).context("could not load environment from file")?;

    export_env(&mut io::stdout().lock(), &values)?;
    Ok(())
}
