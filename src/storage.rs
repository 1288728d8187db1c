//! File-system access behind a trait, so sessions and asset copies can be driven against
//! a real disk or an in-memory stand-in.

use crate::error::{Result, VfxError};
use std::fs;
use std::path::Path;

pub trait FileSystem {
    fn read_text(&self, path: &Path) -> Result<String>;
    fn write_text(&self, path: &Path, text: &str) -> Result<()>;
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| {
            VfxError::io_with_path(
                std::io::Error::new(std::io::ErrorKind::InvalidData, "file is not valid UTF-8"),
                path,
            )
        })
    }

    fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        self.write_bytes(path, text.as_bytes())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| VfxError::io_with_path(e, path))
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes).map_err(|e| VfxError::io_with_path(e, path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| VfxError::io_with_path(e, path))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent)?;
        }
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| VfxError::io_with_path(e, from))
    }
}
