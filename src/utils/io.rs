//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a file handle is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    #[default]
    Read,
    /// Create or truncate, write only.
    Write,
    /// Create if missing, append.
    Append,
    ReadWrite,
}

impl OpenMode {
    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true).create(true),
        };
        options
    }
}

/// Read file contents with standardized error handling.
pub fn read_bytes(path: &Path, operation: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to a file, creating or truncating it.
pub fn write_bytes(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::resource_create(path.to_string_lossy(), e.to_string()))
}

pub fn open(path: &Path, mode: OpenMode) -> Result<File> {
    mode.options()
        .open(path)
        .map_err(|e| Error::resource_create(path.to_string_lossy(), e.to_string()))
}

/// Write `content` to a new file named `<prefix><random>` in the system temp dir.
///
/// The file is closed and kept on disk; the caller owns its deletion.
pub fn write_temp(prefix: &str, content: &[u8]) -> Result<PathBuf> {
    let temp_dir = std::env::temp_dir();
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile_in(&temp_dir)
        .map_err(|e| Error::resource_create(temp_dir.to_string_lossy(), e.to_string()))?;

    file.write_all(content)
        .map_err(|e| Error::resource_create(file.path().to_string_lossy(), e.to_string()))?;

    // Until `keep()` the file is removed on drop, so every error path leaves nothing behind.
    file.as_file()
        .sync_all()
        .map_err(|e| Error::resource_create(file.path().to_string_lossy(), e.to_string()))?;

    let (_, path) = file
        .keep()
        .map_err(|e| Error::resource_create(e.file.path().to_string_lossy(), e.error.to_string()))?;

    Ok(path)
}
