//! Field-level schema changes.

use super::{ChangeKind, Operation, OperationReport};
use crate::error::{AnkiError, Result};
use crate::model::Collection;

fn require_field(collection: &Collection, model: &str, field: &str) -> Result<()> {
    let m = collection.lookup_model(model)?;
    if m.field_index(field).is_none() {
        return Err(AnkiError::Validation(format!(
            "field '{}' does not exist in model '{}'",
            field, m.name
        )));
    }
    Ok(())
}

/// Rename a field and every template reference to it.
#[derive(Debug, Clone)]
pub struct RenameField {
    pub model: String,
    pub old: String,
    pub new: String,
}

impl RenameField {
    pub fn new(model: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

impl Operation for RenameField {
    fn name(&self) -> &'static str {
        "rename-field"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        require_field(collection, &self.model, &self.old)?;
        let model = collection.lookup_model(&self.model)?;
        if self.new.trim().is_empty() {
            return Err(AnkiError::Validation("field name cannot be empty".to_string()));
        }
        if self.old != self.new && model.field_index(&self.new).is_some() {
            return Err(AnkiError::Validation(format!(
                "field '{}' already exists in model '{}'",
                self.new, model.name
            )));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let report = OperationReport::new(self.name());
        if self.old == self.new {
            return Ok(report.with_message(format!("field '{}' already has that name", self.old)));
        }
        let model = collection.lookup_model(&self.model)?;
        let (model_id, model_name) = (model.id, model.name.clone());

        let templates = collection.rename_field(model_id, &self.old, &self.new)?;
        let mut report = report.with_message(format!(
            "renamed field '{}' to '{}' in model '{}' ({} template(s) updated)",
            self.old, self.new, model_name, templates
        ));
        report.record(
            ChangeKind::Renamed,
            format!("/models/{}/fields/{}", model_name, self.new),
        );
        Ok(report)
    }
}

/// Add a field at a position, filling existing notes with a default value.
#[derive(Debug, Clone)]
pub struct AddField {
    pub model: String,
    pub field: String,
    /// Zero-based insert position; `None` appends
    pub position: Option<usize>,
    pub default: String,
}

impl AddField {
    pub fn new(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
            position: None,
            default: String::new(),
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }
}

impl Operation for AddField {
    fn name(&self) -> &'static str {
        "add-field"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model(&self.model)?;
        if self.field.trim().is_empty() {
            return Err(AnkiError::Validation("field name cannot be empty".to_string()));
        }
        if model.field_index(&self.field).is_some() {
            return Err(AnkiError::Validation(format!(
                "field '{}' already exists in model '{}'",
                self.field, model.name
            )));
        }
        if let Some(position) = self.position {
            if position > model.fields.len() {
                return Err(AnkiError::Validation(format!(
                    "position {} is past the end of model '{}' ({} fields)",
                    position,
                    model.name,
                    model.fields.len()
                )));
            }
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model(&self.model)?;
        let (model_id, model_name) = (model.id, model.name.clone());
        let notes = collection.note_ids_of(model_id).len();

        let ord = collection.add_field_at(model_id, &self.field, self.position, &self.default)?;
        let mut report = OperationReport::new(self.name()).with_message(format!(
            "added field '{}' at position {} to model '{}' ({} note(s) updated)",
            self.field, ord, model_name, notes
        ));
        report.record(
            ChangeKind::Added,
            format!("/models/{}/fields/{}", model_name, self.field),
        );
        Ok(report)
    }
}

/// Remove a field and its value from every note of the model.
#[derive(Debug, Clone)]
pub struct RemoveField {
    pub model: String,
    pub field: String,
    /// Also delete `{{field}}` references from templates
    pub strip_references: bool,
}

impl RemoveField {
    pub fn new(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
            strip_references: false,
        }
    }
}

impl Operation for RemoveField {
    fn name(&self) -> &'static str {
        "remove-field"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        require_field(collection, &self.model, &self.field)?;
        let model = collection.lookup_model(&self.model)?;
        if model.fields.len() == 1 {
            return Err(AnkiError::Validation(format!(
                "cannot remove the last field of model '{}'",
                model.name
            )));
        }
        if model.field(&self.field).is_some_and(|f| f.prevent_deletion) {
            return Err(AnkiError::Validation(format!(
                "field '{}' is protected from deletion",
                self.field
            )));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model(&self.model)?;
        let (model_id, model_name) = (model.id, model.name.clone());
        let notes = collection.note_ids_of(model_id).len();

        collection.remove_field(model_id, &self.field)?;
        let mut templates = 0;
        if self.strip_references {
            if let Some(model) = collection.models.get_mut(model_id) {
                for template in model.templates.iter_mut() {
                    if template.strip_field_references(&self.field) {
                        templates += 1;
                    }
                }
            }
        }

        let mut report = OperationReport::new(self.name()).with_message(format!(
            "removed field '{}' from model '{}' ({} note(s) updated, {} template(s) stripped)",
            self.field, model_name, notes, templates
        ));
        report.record(
            ChangeKind::Removed,
            format!("/models/{}/fields/{}", model_name, self.field),
        );
        Ok(report)
    }
}
