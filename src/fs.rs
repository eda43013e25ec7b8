//! File access capability handed to the orchestration layer.
//!
//! Everything that touches the disk goes through [`FileAccess`], so callers
//! (and tests) choose the backing store instead of swapping globals.

use std::fs;
use std::io;
#[cfg(unix)]
use std::io::Write;
use std::path::Path;

pub trait FileAccess {
    /// Read the whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the file's contents. `mode` applies Unix permission bits to
    /// the written file when given.
    fn write(&self, path: &Path, data: &[u8], mode: Option<u32>) -> io::Result<()>;

    /// Permission bits of an existing file.
    fn mode(&self, path: &Path) -> io::Result<u32>;
}

impl<T: FileAccess + ?Sized> FileAccess for &T {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, data: &[u8], mode: Option<u32>) -> io::Result<()> {
        (**self).write(path, data, mode)
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        (**self).mode(path)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFiles;

impl FileAccess for OsFiles {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8], mode: Option<u32>) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            let Some(mode) = mode else {
                return fs::write(path, data);
            };

            // A new file never exists with wider permissions than `mode`.
            let mut file = fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .mode(mode)
                .open(path)?;
            file.write_all(data)?;
            file.flush()?;

            // An existing file keeps its old bits through open(2).
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            Ok(())
        }

        #[cfg(not(unix))]
        {
            let _ = mode;
            fs::write(path, data)
        }
    }

    #[cfg(unix)]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        use std::os::unix::fs::PermissionsExt;
        Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
    }

    #[cfg(not(unix))]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        let readonly = fs::metadata(path)?.permissions().readonly();
        Ok(if readonly { 0o444 } else { 0o644 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        OsFiles.write(&path, b"{}", None).unwrap();
        assert_eq!(OsFiles.read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_read_missing_file() {
        let err = OsFiles.read(Path::new("/does/not/exist")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_applies_mode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");

        OsFiles.write(&path, b"secret", Some(0o440)).unwrap();
        assert_eq!(OsFiles.mode(&path).unwrap(), 0o440);
        assert_eq!(OsFiles.read(&path).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_new_file_created_with_mode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");

        // owner read-only: creating through open(2) with the mode still
        // hands back a writable descriptor
        OsFiles.write(&path, b"secret", Some(0o400)).unwrap();
        assert_eq!(OsFiles.mode(&path).unwrap(), 0o400);
        assert_eq!(OsFiles.read(&path).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_narrows_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("key");
        fs::write(&path, b"old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        OsFiles.write(&path, b"new", Some(0o600)).unwrap();
        assert_eq!(OsFiles.mode(&path).unwrap(), 0o600);
        assert_eq!(OsFiles.read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_write_without_mode_truncates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        OsFiles.write(&path, b"{\"a\": 1}", None).unwrap();
        OsFiles.write(&path, b"{}", None).unwrap();
        assert_eq!(OsFiles.read(&path).unwrap(), b"{}");
    }
}
