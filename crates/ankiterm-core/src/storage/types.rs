//! Raw data types for the storage layer.
//!
//! These mirror the on-disk tables one-to-one. The schema adapter turns them
//! into the object model and back; nothing here interprets JSON or field
//! separators.

use rusqlite::types::Value as SqlValue;

/// Name of the generation 21 database inside an archive.
pub const DATABASE_ANKI21: &str = "collection.anki21";

/// Name of the generation 2 database inside an archive.
pub const DATABASE_ANKI2: &str = "collection.anki2";

/// How a zip entry was (and will be) compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCompression {
    Stored,
    Deflated,
}

/// One file inside an archive, kept in archive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the zip
    pub name: String,

    /// Uncompressed bytes
    pub data: Vec<u8>,

    /// Compression to use when writing back
    pub compression: EntryCompression,
}

/// The contents of an opened archive.
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    /// Every entry, database included, in original order
    pub entries: Vec<ArchiveEntry>,

    /// Name of the entry holding the selected collection database
    pub database_name: String,
}

impl ArchiveContents {
    /// Bytes of the selected collection database.
    pub fn database(&self) -> &[u8] {
        self.entries
            .iter()
            .find(|e| e.name == self.database_name)
            .map(|e| e.data.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the collection database bytes in place.
    pub fn set_database(&mut self, data: Vec<u8>) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.name == self.database_name)
        {
            entry.data = data;
        }
    }

    /// Entries other than the collection databases.
    pub fn media_entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries
            .iter()
            .filter(|e| e.name != DATABASE_ANKI21 && e.name != DATABASE_ANKI2)
    }

    /// Media file names from the `media` manifest, ordered by their numeric key.
    pub fn media_files(&self) -> crate::Result<Vec<String>> {
        let manifest = match self.entries.iter().find(|e| e.name == "media") {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        if manifest.data.is_empty() {
            return Ok(Vec::new());
        }
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&manifest.data)?;
        let mut files: Vec<(u64, String)> = map
            .into_iter()
            .map(|(key, value)| {
                let index = key.parse::<u64>().unwrap_or(u64::MAX);
                let name = value.as_str().unwrap_or_default().to_string();
                (index, name)
            })
            .collect();
        files.sort();
        Ok(files.into_iter().map(|(_, name)| name).collect())
    }
}

/// The single row of the `col` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColRow {
    pub id: i64,
    pub crt: i64,
    pub modified: i64,
    pub scm: i64,
    pub ver: i64,
    pub dty: i64,
    pub usn: i64,
    pub ls: i64,
    pub conf: String,
    pub models: String,
    pub decks: String,
    pub dconf: String,
    pub tags: String,
}

/// A row of the `notes` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    pub id: i64,
    pub guid: String,
    pub mid: i64,
    pub modified: i64,
    pub usn: i64,
    pub tags: String,
    pub flds: String,
    /// Declared `integer` but usually holds text; kept as stored.
    pub sfld: SqlValue,
    pub csum: i64,
    pub flags: i64,
    pub data: String,
}

/// A row of the `cards` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRow {
    pub id: i64,
    pub nid: i64,
    pub did: i64,
    pub ord: i64,
    pub modified: i64,
    pub usn: i64,
    pub card_type: i64,
    pub queue: i64,
    pub due: i64,
    pub ivl: i64,
    pub factor: i64,
    pub reps: i64,
    pub lapses: i64,
    pub left: i64,
    pub odue: i64,
    pub odid: i64,
    pub flags: i64,
    pub data: String,
}

/// A row of the `graves` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraveRow {
    pub usn: i64,
    pub oid: i64,
    pub kind: i64,
}

/// Every table the core reads, as loaded from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCollection {
    pub col: ColRow,
    pub notes: Vec<NoteRow>,
    pub cards: Vec<CardRow>,
    pub graves: Vec<GraveRow>,
}

/// Row counts touched by a write-back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub col_updated: bool,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl WriteStats {
    pub fn is_empty(&self) -> bool {
        !self.col_updated && self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, data: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            data: data.to_vec(),
            compression: EntryCompression::Deflated,
        }
    }

    #[test]
    fn test_set_database_keeps_order() {
        let mut contents = ArchiveContents {
            entries: vec![
                entry(DATABASE_ANKI2, b"stub"),
                entry(DATABASE_ANKI21, b"real"),
                entry("media", b"{}"),
            ],
            database_name: DATABASE_ANKI21.to_string(),
        };
        contents.set_database(b"next".to_vec());

        let names: Vec<_> = contents.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![DATABASE_ANKI2, DATABASE_ANKI21, "media"]);
        assert_eq!(contents.database(), b"next");
        assert_eq!(contents.entries[0].data, b"stub");
    }

    #[test]
    fn test_media_files_sorted_by_key() {
        let contents = ArchiveContents {
            entries: vec![
                entry(DATABASE_ANKI21, b""),
                entry("media", br#"{"10": "b.mp3", "2": "a.jpg"}"#),
            ],
            database_name: DATABASE_ANKI21.to_string(),
        };
        assert_eq!(contents.media_files().unwrap(), vec!["a.jpg", "b.mp3"]);
        assert_eq!(contents.media_entries().count(), 1);
    }
}
