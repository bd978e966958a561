//! An opened archive: load, mutate, save or discard.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{AnkiError, Result};
use crate::model::{Collection, SchemaGeneration};
use crate::ops::{self, InfoOp, Operation, OperationReport, Query};
use crate::schema;
use crate::storage::{
    ApkgArchive, ArchiveContainer, ArchiveContents, CollectionDb, RawCollection, WriteStats,
};

/// Undo steps kept per session; older snapshots are dropped.
pub const UNDO_DEPTH: usize = 32;

/// What a save did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub path: PathBuf,
    /// False when there was nothing to write
    pub written: bool,
    pub stats: WriteStats,
}

/// Exclusive owner of one opened collection.
pub struct Session {
    path: PathBuf,
    contents: ArchiveContents,
    /// Rows as last read from or written to the database
    baseline: RawCollection,
    /// Collection state matching `baseline`
    saved: Collection,
    collection: Collection,
    history: Vec<Collection>,
}

impl Session {
    /// Open an archive on disk.
    ///
    /// # Errors
    ///
    /// Returns `AnkiError::NotFound` if the file is missing, `Storage` if it
    /// is not a readable archive, and `Schema` if the collection inside is
    /// malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = ApkgArchive::open(path)?;
        Self::from_contents(path, contents)
    }

    /// Build a session from archive contents already in memory.
    pub fn from_contents(path: impl Into<PathBuf>, contents: ArchiveContents) -> Result<Self> {
        let path = path.into();
        let hint = SchemaGeneration::from_database_name(&contents.database_name);
        let db = CollectionDb::from_bytes(contents.database())?;
        let baseline = db.read()?;
        let collection = schema::load(&baseline, hint)?;
        info!(
            "Opened {} ({}, {} models, {} notes)",
            path.display(),
            collection.generation.label(),
            collection.models.len(),
            collection.notes.len()
        );

        Ok(Self {
            path,
            contents,
            baseline,
            saved: collection.clone(),
            collection,
            history: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn generation(&self) -> SchemaGeneration {
        self.collection.generation
    }

    /// Whether there are changes not yet saved.
    pub fn is_modified(&self) -> bool {
        self.collection != self.saved
    }

    /// Media file names listed in the archive manifest.
    pub fn media_files(&self) -> Result<Vec<String>> {
        self.contents.media_files()
    }

    pub fn query(&self, query: &dyn Query) -> Result<OperationReport> {
        query.run(&self.collection)
    }

    /// Collection summary including the media count.
    pub fn info(&self) -> Result<OperationReport> {
        let media_files = match self.media_files() {
            Ok(files) => Some(files.len()),
            Err(e) => {
                warn!("Unreadable media manifest: {}", e);
                None
            }
        };
        self.query(&InfoOp { media_files })
    }

    /// Apply one operation; on failure nothing changes.
    pub fn apply(&mut self, operation: &dyn Operation) -> Result<OperationReport> {
        let snapshot = self.collection.clone();
        let report = ops::apply(&mut self.collection, operation)?;
        self.remember(snapshot);
        Ok(report)
    }

    /// Apply operations as one unit; one undo step reverts all of them.
    pub fn apply_batch(&mut self, operations: &[&dyn Operation]) -> Result<Vec<OperationReport>> {
        let snapshot = self.collection.clone();
        let reports = ops::apply_batch(&mut self.collection, operations)?;
        self.remember(snapshot);
        Ok(reports)
    }

    fn remember(&mut self, snapshot: Collection) {
        if self.collection == snapshot {
            return;
        }
        if self.history.len() == UNDO_DEPTH {
            self.history.remove(0);
        }
        self.history.push(snapshot);
    }

    /// Revert the most recent applied change. Returns false if there is none.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.collection = previous;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Drop every unsaved change.
    pub fn discard(&mut self) {
        self.collection = self.saved.clone();
        self.history.clear();
    }

    /// Write the archive to `target`, or back to where it was opened from.
    ///
    /// Saving elsewhere refuses to replace an existing file unless `force`.
    /// An unmodified session saved in place writes nothing.
    pub fn save(&mut self, target: Option<&Path>, force: bool) -> Result<SaveSummary> {
        let destination = target.unwrap_or(&self.path).to_path_buf();
        let in_place = same_file(&destination, &self.path);
        if !in_place && destination.exists() && !force {
            return Err(AnkiError::Validation(format!(
                "{} already exists; pass --force to overwrite",
                destination.display()
            )));
        }

        if !self.is_modified() {
            if in_place {
                debug!("No changes to save to {}", destination.display());
                return Ok(SaveSummary {
                    path: destination,
                    written: false,
                    stats: WriteStats::default(),
                });
            }
            ApkgArchive::save(&destination, &self.contents)?;
            info!("Saved {}", destination.display());
            return Ok(SaveSummary {
                path: destination,
                written: true,
                stats: WriteStats::default(),
            });
        }

        let next = schema::serialize(&self.collection, Some(&self.baseline))?;
        let mut db = CollectionDb::from_bytes(self.contents.database())?;
        let stats = db.write(&self.baseline, &next)?;
        debug!(
            "Database rows: {} inserted, {} updated, {} deleted",
            stats.inserted, stats.updated, stats.deleted
        );
        let previous = self.contents.database().to_vec();
        self.contents.set_database(db.to_bytes()?);

        // The session only counts as saved once the archive is on disk.
        if let Err(e) = ApkgArchive::save(&destination, &self.contents) {
            self.contents.set_database(previous);
            return Err(e);
        }
        self.baseline = next;
        self.saved = self.collection.clone();
        info!("Saved {}", destination.display());
        Ok(SaveSummary {
            path: destination,
            written: true,
            stats,
        })
    }
}

/// Whether two paths name the same file, looking through `.` and symlinks
/// when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(dir.path().join("absent.apkg")).err().unwrap();
        assert!(matches!(err, AnkiError::NotFound { .. }));
    }
}
