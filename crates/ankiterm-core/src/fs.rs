//! Filesystem utilities for atomic archive writes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AnkiError, Result};

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists,
/// and it always fails across devices. The fallback removes the destination and retries, then
/// falls back to a copy.
///
/// If the rename ultimately fails, the temp file is cleaned up.
///
/// # Errors
///
/// Returns an error if every strategy fails.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        if fs::rename(temp_path, destination).is_ok() {
            return Ok(());
        }
        let copied = fs::copy(temp_path, destination);
        let _ = fs::remove_file(temp_path);
        copied.map_err(|copy_err| {
            io::Error::new(
                copy_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, copy: {})",
                    initial_err, copy_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Write `data` to `path` through a synced sibling temp file.
///
/// Readers never observe a half-written archive: either the old file or the
/// complete new one is present at `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AnkiError::Storage(format!("System time error: {}", e)))?
        .as_nanos();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AnkiError::Storage("Invalid archive filename".to_string()))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", filename, nanos));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| AnkiError::Storage(format!("Temp file create failed: {}", e)))?;
    let written = file.write_all(data).and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(AnkiError::Storage(format!("Temp file write failed: {}", e)));
    }
    drop(file);

    rename_with_fallback(&temp_path, path)
        .map_err(|e| AnkiError::Storage(format!("Atomic rename failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_rename_new_file() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("temp.apkg");
        let dest = dir.path().join("dest.apkg");

        File::create(&temp).unwrap().write_all(b"test").unwrap();

        rename_with_fallback(&temp, &dest).unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "test");
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("deck.apkg");
        fs::write(&dest, b"old").unwrap();

        write_atomic(&dest, b"new").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
