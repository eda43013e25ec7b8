pub mod decrypt;
pub mod encrypt;
pub mod env;
pub mod keygen;

pub use decrypt::decrypt;
pub use encrypt::encrypt;
pub use env::env;
pub use keygen::keygen;

use anyhow::{Context, Result};
use std::io::{self, Read};
use zeroize::Zeroizing;

/// Read a private key piped on stdin, trimming surrounding whitespace.
fn read_key_from_stdin() -> Result<Zeroizing<String>> {
    let mut input = Zeroizing::new(String::new());
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read from stdin")?;
    Ok(Zeroizing::new(input.trim().to_string()))
}
