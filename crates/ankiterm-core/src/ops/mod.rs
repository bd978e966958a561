//! Operation engine.
//!
//! Write operations implement [`Operation`]: `validate` runs against the
//! collection before anything changes, and `execute` mutates. The engine
//! executes on a working copy and swaps it in only when every step
//! succeeded and no new integrity issue appeared, so a failed invocation
//! leaves the collection exactly as it was.
//!
//! Read operations implement [`Query`] and bypass that machinery.

mod decks;
mod fields;
mod models;
mod notes;
mod populate;
mod read;
mod registry;
mod report;

use std::collections::HashSet;

use log::debug;

use crate::error::{AnkiError, Result};
use crate::model::Collection;

pub use decks::DivideDecks;
pub use fields::{AddField, RemoveField, RenameField};
pub use models::{AddModel, AddTemplate, RenameModel, TemplateSpec};
pub use notes::{MigrateNotes, RemoveEmptyNotes, TagNotes};
pub use populate::PopulateFields;
pub use read::{CountOp, GetOp, InfoOp, ListOp};
pub use registry::{from_json, OPERATION_NAMES};
pub use report::{Change, ChangeKind, Failure, OperationReport};

/// A mutating operation.
pub trait Operation {
    fn name(&self) -> &'static str;

    /// Check preconditions. Must not depend on anything `execute` changes
    /// in an earlier step of the same batch except through `collection`.
    fn validate(&self, collection: &Collection) -> Result<()>;

    /// Apply the change. Only called after `validate` succeeded.
    fn execute(&self, collection: &mut Collection) -> Result<OperationReport>;
}

/// A read-only operation.
pub trait Query {
    fn name(&self) -> &'static str;

    fn run(&self, collection: &Collection) -> Result<OperationReport>;
}

/// Apply one operation atomically.
pub fn apply(collection: &mut Collection, operation: &dyn Operation) -> Result<OperationReport> {
    let mut reports = apply_batch(collection, &[operation])?;
    reports
        .pop()
        .ok_or_else(|| AnkiError::Validation("no operation to apply".to_string()))
}

/// Apply several operations as one unit: all commit or none do.
pub fn apply_batch(
    collection: &mut Collection,
    operations: &[&dyn Operation],
) -> Result<Vec<OperationReport>> {
    let known: HashSet<String> = collection.integrity_issues().into_iter().collect();
    let mut working = collection.clone();
    let mut reports = Vec::with_capacity(operations.len());

    for operation in operations {
        debug!("Validating {}", operation.name());
        operation.validate(&working)?;
        debug!("Executing {}", operation.name());
        reports.push(operation.execute(&mut working)?);
    }

    // Issues the archive already had on load are not ours to fail on.
    let introduced: Vec<String> = working
        .integrity_issues()
        .into_iter()
        .filter(|issue| !known.contains(issue))
        .collect();
    if !introduced.is_empty() {
        return Err(AnkiError::Integrity(introduced.join("; ")));
    }

    if reports.iter().any(OperationReport::has_changes) {
        working.mark_modified();
        *collection = working;
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection_fixture;

    struct Breaks;

    impl Operation for Breaks {
        fn name(&self) -> &'static str {
            "breaks"
        }

        fn validate(&self, _collection: &Collection) -> Result<()> {
            Ok(())
        }

        fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
            if let Some(note) = collection.notes.values_mut().next() {
                note.fields.push("extra".to_string());
            }
            let mut report = OperationReport::new("breaks");
            report.record(ChangeKind::Modified, "/notes");
            Ok(report)
        }
    }

    #[test]
    fn test_integrity_failure_rolls_back() {
        let mut collection = collection_fixture();
        let before = collection.clone();
        let err = apply(&mut collection, &Breaks).unwrap_err();

        assert!(matches!(err, AnkiError::Integrity(_)));
        assert_eq!(collection, before);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut collection = collection_fixture();
        let before = collection.clone();
        let rename = RenameField::new("Basic", "Front", "Question");
        let bad = RenameField::new("Basic", "Nope", "Other");

        let err = apply_batch(&mut collection, &[&rename, &bad]).unwrap_err();
        assert!(matches!(err, AnkiError::Validation(_)));
        assert_eq!(collection, before);
    }

    #[test]
    fn test_commit_bumps_modified() {
        let mut collection = collection_fixture();
        let before = collection.meta.modified;
        apply(&mut collection, &RenameField::new("Basic", "Front", "Question")).unwrap();
        assert!(collection.meta.modified > before);
    }

    #[test]
    fn test_no_change_leaves_collection_untouched() {
        let mut collection = collection_fixture();
        let before = collection.clone();
        apply(&mut collection, &RenameField::new("Basic", "Front", "Front")).unwrap();
        assert_eq!(collection, before);
    }
}
