//! Archive container trait definition.
//!
//! The `ArchiveContainer` trait is the seam between the collection core and
//! the packaging format. The core only ever sees database bytes plus an
//! ordered list of pass-through entries.

use std::path::Path;

use super::types::ArchiveContents;
use crate::error::Result;

/// Container format for collection archives.
///
/// All implementations must ensure:
/// - Entries other than the collection database are passed through untouched
/// - Entry order is preserved across a read/write cycle
/// - Saving never leaves a partially written file at the target path
pub trait ArchiveContainer {
    /// Parse an archive from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `AnkiError::Storage` if the container is corrupt, or
    /// `AnkiError::Schema` if it holds no collection database.
    fn read(bytes: &[u8]) -> Result<ArchiveContents>;

    /// Serialize archive contents into container bytes.
    fn write(contents: &ArchiveContents) -> Result<Vec<u8>>;

    /// Open an archive on disk.
    ///
    /// # Errors
    ///
    /// Returns `AnkiError::NotFound` if the file does not exist.
    fn open(path: &Path) -> Result<ArchiveContents> {
        if !path.exists() {
            return Err(crate::AnkiError::not_found(
                path.display().to_string(),
                "filesystem",
            ));
        }
        let bytes = std::fs::read(path)?;
        Self::read(&bytes)
    }

    /// Save an archive atomically.
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file; replaced atomically if it exists
    /// * `contents` - Entries to write, database included
    fn save(path: &Path, contents: &ArchiveContents) -> Result<()> {
        let bytes = Self::write(contents)?;
        crate::fs::write_atomic(path, &bytes)
    }
}
