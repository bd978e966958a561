//! Model-level schema changes.

use std::collections::HashSet;

use super::{ChangeKind, Operation, OperationReport};
use crate::error::{AnkiError, Result};
use crate::model::{Collection, DeckId, Model, ModelKind, Template};

/// A template given by name and formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    pub name: String,
    pub qfmt: String,
    pub afmt: String,
}

impl TemplateSpec {
    pub fn new(name: impl Into<String>, qfmt: impl Into<String>, afmt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qfmt: qfmt.into(),
            afmt: afmt.into(),
        }
    }
}

fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(AnkiError::Validation(format!("{} name cannot be empty", what)));
        }
        if !seen.insert(name) {
            return Err(AnkiError::Validation(format!(
                "{} name '{}' is given more than once",
                what, name
            )));
        }
    }
    Ok(())
}

/// Create a new model.
#[derive(Debug, Clone)]
pub struct AddModel {
    pub name: String,
    pub fields: Vec<String>,
    /// Empty means one default template
    pub templates: Vec<TemplateSpec>,
    pub css: Option<String>,
    pub cloze: bool,
}

impl AddModel {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            templates: Vec::new(),
            css: None,
            cloze: false,
        }
    }

    pub fn with_template(mut self, template: TemplateSpec) -> Self {
        self.templates.push(template);
        self
    }

    fn default_deck(collection: &Collection) -> Option<DeckId> {
        collection
            .current_deck_id()
            .filter(|id| collection.decks.contains(*id))
            .or_else(|| collection.decks.first().map(|d| d.id))
    }
}

impl Operation for AddModel {
    fn name(&self) -> &'static str {
        "add-model"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AnkiError::Validation("model name cannot be empty".to_string()));
        }
        if !collection.models.by_name(&self.name).is_empty() {
            return Err(AnkiError::Validation(format!(
                "model '{}' already exists",
                self.name
            )));
        }
        if self.fields.is_empty() {
            return Err(AnkiError::Validation(
                "a model needs at least one field".to_string(),
            ));
        }
        unique_names(self.fields.iter().map(String::as_str), "field")?;
        unique_names(self.templates.iter().map(|t| t.name.as_str()), "template")?;
        if self.cloze && self.templates.len() > 1 {
            return Err(AnkiError::Validation(
                "a cloze model has exactly one template".to_string(),
            ));
        }
        if collection.decks.is_empty() {
            return Err(AnkiError::Validation("collection has no decks".to_string()));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let id = collection.next_model_id();
        let kind = if self.cloze {
            ModelKind::Cloze
        } else {
            ModelKind::Standard
        };
        let templates = self
            .templates
            .iter()
            .enumerate()
            .map(|(ord, t)| Template::new(t.name.clone(), ord, t.qfmt.clone(), t.afmt.clone()))
            .collect();
        let mut model = Model::new(id, self.name.clone(), kind, &self.fields, templates);
        if let Some(css) = &self.css {
            model.css = css.clone();
        }
        model.did = Self::default_deck(collection);
        let template_count = model.templates.len();
        collection.add_model(model)?;

        let mut report = OperationReport::new(self.name()).with_message(format!(
            "added model '{}' (id {}) with {} field(s) and {} template(s)",
            self.name,
            id,
            self.fields.len(),
            template_count
        ));
        report.record(ChangeKind::Added, format!("/models/{}", self.name));
        Ok(report)
    }
}

/// Rename a model.
#[derive(Debug, Clone)]
pub struct RenameModel {
    pub model: String,
    pub new_name: String,
}

impl RenameModel {
    pub fn new(model: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            new_name: new_name.into(),
        }
    }
}

impl Operation for RenameModel {
    fn name(&self) -> &'static str {
        "rename-model"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model(&self.model)?;
        if self.new_name.trim().is_empty() {
            return Err(AnkiError::Validation("model name cannot be empty".to_string()));
        }
        if collection
            .models
            .by_name(&self.new_name)
            .iter()
            .any(|m| m.id != model.id)
        {
            return Err(AnkiError::Validation(format!(
                "model '{}' already exists",
                self.new_name
            )));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model(&self.model)?;
        let (id, old_name) = (model.id, model.name.clone());
        let report = OperationReport::new(self.name());
        if old_name == self.new_name {
            return Ok(report.with_message(format!("model '{}' already has that name", old_name)));
        }

        collection.rename_model(id, &self.new_name)?;
        let mut report = report.with_message(format!(
            "renamed model '{}' to '{}'",
            old_name, self.new_name
        ));
        report.record(ChangeKind::Renamed, format!("/models/{}", self.new_name));
        Ok(report)
    }
}

/// Append a template to a model. Existing notes get no new cards.
#[derive(Debug, Clone)]
pub struct AddTemplate {
    pub model: String,
    pub template: TemplateSpec,
}

impl AddTemplate {
    pub fn new(model: impl Into<String>, template: TemplateSpec) -> Self {
        Self {
            model: model.into(),
            template,
        }
    }
}

impl Operation for AddTemplate {
    fn name(&self) -> &'static str {
        "add-template"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model(&self.model)?;
        unique_names([self.template.name.as_str()], "template")?;
        if model.is_cloze() {
            return Err(AnkiError::Validation(format!(
                "cloze model '{}' cannot take more templates",
                model.name
            )));
        }
        if model.template_index(&self.template.name).is_some() {
            return Err(AnkiError::Validation(format!(
                "template '{}' already exists in model '{}'",
                self.template.name, model.name
            )));
        }
        Ok(())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model(&self.model)?;
        let (id, model_name) = (model.id, model.name.clone());
        let template = Template::new(
            self.template.name.clone(),
            0,
            self.template.qfmt.clone(),
            self.template.afmt.clone(),
        );
        let ord = collection.add_template(id, template)?;

        let mut report = OperationReport::new(self.name()).with_message(format!(
            "added template '{}' to model '{}' at ordinal {}",
            self.template.name, model_name, ord
        ));
        report.record(
            ChangeKind::Added,
            format!("/models/{}/templates/{}", model_name, self.template.name),
        );
        Ok(report)
    }
}
