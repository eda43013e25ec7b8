use anyhow::{Context, Result};
use ejson::crypto::Keypair;
use ejson::document::generate_keypair;
use ejson::key::KeyDir;
use std::path::Path;

/// Generate a keypair. With `write`, the private key goes into the key
/// directory and only the public key is printed.
pub fn keygen(keydir: &Path, write: bool) -> Result<()> {
    if !write {
        let (public, private) = generate_keypair().context("Key generation failed")?;
        println!("Public Key:\n{public}\nPrivate Key:\n{}", private.as_str());
        return Ok(());
    }

    let keypair = Keypair::generate().context("Key generation failed")?;
    KeyDir::new(keydir)
        .write_private_key(&keypair)
        .with_context(|| format!("Failed to write key to {}", keydir.display()))?;
    println!("{}", keypair.public_hex());

    Ok(())
}
