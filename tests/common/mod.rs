use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Public half of the fixture keypair.
pub const PUBLIC_KEY: &str = "8d8647e2eeb6d2e31228e6df7da3df921ec3b799c3f66a171cd37a1ed3004e7d";

/// Private half of the fixture keypair.
pub const PRIVATE_KEY: &str = "c5caa31a5b8cb2be0074b37c56775f533b368b81d8fd33b94181f79bd6e47f87";

/// Spawn the ejson binary with a clean environment for keydir and logging.
pub fn ejson_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("ejson");
    cmd.env_remove("EJSON_KEYDIR").env_remove("EJSON_LOG");
    cmd
}

/// Temporary key directory holding the fixture private key.
pub fn create_keydir() -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");
    fs::write(temp.path().join(PUBLIC_KEY), PRIVATE_KEY).expect("failed to write key file");
    temp
}

/// Single-object document for the fixture public key with extra `body` fields.
pub fn document(body: &str) -> String {
    format!("{{\n  \"_public_key\": \"{PUBLIC_KEY}\",\n  {body}\n}}\n")
}

/// Write `contents` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("failed to write file");
    path
}
