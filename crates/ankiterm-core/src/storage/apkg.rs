//! Zip-based `.apkg` archive container.

use std::io::{Cursor, Read, Write};

use log::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::traits::ArchiveContainer;
use super::types::{
    ArchiveContents, ArchiveEntry, EntryCompression, DATABASE_ANKI2, DATABASE_ANKI21,
};
use crate::error::{AnkiError, Result};

/// The `.apkg` / `.colpkg` zip container.
pub struct ApkgArchive;

impl ApkgArchive {
    fn select_database(entries: &[ArchiveEntry]) -> Result<String> {
        for candidate in [DATABASE_ANKI21, DATABASE_ANKI2] {
            if entries.iter().any(|e| e.name == candidate) {
                return Ok(candidate.to_string());
            }
        }
        Err(AnkiError::Schema(
            "no collection database in archive".to_string(),
        ))
    }
}

impl ArchiveContainer for ApkgArchive {
    fn read(bytes: &[u8]) -> Result<ArchiveContents> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let compression = match file.compression() {
                CompressionMethod::Stored => EntryCompression::Stored,
                _ => EntryCompression::Deflated,
            };
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                data,
                compression,
            });
        }

        let database_name = Self::select_database(&entries)?;
        debug!(
            "Opened archive with {} entries, using {}",
            entries.len(),
            database_name
        );

        Ok(ArchiveContents {
            entries,
            database_name,
        })
    }

    fn write(contents: &ArchiveContents) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &contents.entries {
            let method = match entry.compression {
                EntryCompression::Stored => CompressionMethod::Stored,
                EntryCompression::Deflated => CompressionMethod::Deflated,
            };
            let options = FileOptions::default()
                .compression_method(method)
                .large_file(entry.data.len() as u64 >= u32::MAX as u64);
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(files: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data, method) in files {
            writer
                .start_file(*name, FileOptions::default().compression_method(*method))
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_prefers_anki21() {
        let bytes = build_zip(&[
            (DATABASE_ANKI2, b"legacy", CompressionMethod::Deflated),
            (DATABASE_ANKI21, b"modern", CompressionMethod::Deflated),
            ("media", b"{}", CompressionMethod::Deflated),
        ]);
        let contents = ApkgArchive::read(&bytes).unwrap();
        assert_eq!(contents.database_name, DATABASE_ANKI21);
        assert_eq!(contents.database(), b"modern");
    }

    #[test]
    fn test_falls_back_to_anki2() {
        let bytes = build_zip(&[(DATABASE_ANKI2, b"legacy", CompressionMethod::Deflated)]);
        let contents = ApkgArchive::read(&bytes).unwrap();
        assert_eq!(contents.database_name, DATABASE_ANKI2);
    }

    #[test]
    fn test_missing_database_is_schema_error() {
        let bytes = build_zip(&[("media", b"{}", CompressionMethod::Deflated)]);
        let err = ApkgArchive::read(&bytes).unwrap_err();
        assert!(matches!(err, AnkiError::Schema(_)));
    }

    #[test]
    fn test_write_preserves_entries_and_compression() {
        let bytes = build_zip(&[
            (DATABASE_ANKI21, b"db", CompressionMethod::Deflated),
            ("0", b"\x89PNG", CompressionMethod::Stored),
            ("media", br#"{"0": "a.png"}"#, CompressionMethod::Deflated),
        ]);
        let contents = ApkgArchive::read(&bytes).unwrap();
        let rewritten = ApkgArchive::read(&ApkgArchive::write(&contents).unwrap()).unwrap();

        assert_eq!(rewritten.entries, contents.entries);
        assert_eq!(rewritten.entries[1].compression, EntryCompression::Stored);
    }
}
