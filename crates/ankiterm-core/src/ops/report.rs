//! Structured operation results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::NoteId;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Renamed,
    Modified,
    Migrated,
    Tagged,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Modified => "modified",
            ChangeKind::Migrated => "migrated",
            ChangeKind::Tagged => "tagged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    /// Address or description of the entity, e.g. `/models/Basic/fields/Front`
    pub entity: String,
}

/// A note a populator could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub note_id: NoteId,
    pub reason: String,
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub operation: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<NoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OperationReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: String::new(),
            changes: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn record(&mut self, kind: ChangeKind, entity: impl Into<String>) {
        self.changes.push(Change {
            kind,
            entity: entity.into(),
        });
    }

    pub fn fail(&mut self, note_id: NoteId, reason: impl Into<String>) {
        self.failures.push(Failure {
            note_id,
            reason: reason.into(),
        });
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}
