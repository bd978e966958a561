//! Note-level operations: migration between models, tagging, pruning.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use regex::Regex;
use serde_json::Value;

use super::{ChangeKind, Operation, OperationReport};
use crate::error::{AnkiError, Result};
use crate::model::{Collection, FieldMapping, Model, ModelId};

/// Move every note of one model to another, remapping values by field name.
///
/// Cards are re-pointed per source template: an explicit `template_map`
/// entry wins, then a target template with the same name. Anything left
/// over is a validation error unless `fallback_to_first` is set, in which
/// case it goes to the target's first template.
#[derive(Debug, Clone)]
pub struct MigrateNotes {
    pub source: String,
    pub target: String,
    pub mapping: FieldMapping,
    /// Source template name to target template name
    pub template_map: BTreeMap<String, String>,
    pub fallback_to_first: bool,
}

struct MigrationPlan {
    source_id: ModelId,
    target_id: ModelId,
    /// `None` keeps card ordinals as they are
    ords: Option<HashMap<usize, usize>>,
}

impl MigrateNotes {
    pub fn new(source: impl Into<String>, target: impl Into<String>, mapping: FieldMapping) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mapping,
            template_map: BTreeMap::new(),
            fallback_to_first: false,
        }
    }

    fn check_mapping(&self, source: &Model, target: &Model) -> Result<()> {
        if self.mapping.is_empty() {
            return Err(AnkiError::Validation("field mapping is empty".to_string()));
        }
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for (from, to) in &self.mapping {
            if source.field_index(from).is_none() {
                return Err(AnkiError::Validation(format!(
                    "field '{}' does not exist in source model '{}'",
                    from, source.name
                )));
            }
            if target.field_index(to).is_none() {
                return Err(AnkiError::Validation(format!(
                    "field '{}' does not exist in target model '{}'",
                    to, target.name
                )));
            }
            if let Some(other) = claimed.insert(to.as_str(), from.as_str()) {
                return Err(AnkiError::Validation(format!(
                    "target field '{}' is mapped from both '{}' and '{}'",
                    to, other, from
                )));
            }
        }
        Ok(())
    }

    /// Source template ordinal to target template ordinal.
    fn template_ords(&self, source: &Model, target: &Model) -> Result<HashMap<usize, usize>> {
        let mut ords = HashMap::new();
        for (from, to) in &self.template_map {
            let src = source.template_index(from).ok_or_else(|| {
                AnkiError::Validation(format!(
                    "template '{}' does not exist in source model '{}'",
                    from, source.name
                ))
            })?;
            let dst = target.template_index(to).ok_or_else(|| {
                AnkiError::Validation(format!(
                    "template '{}' does not exist in target model '{}'",
                    to, target.name
                ))
            })?;
            ords.insert(src, dst);
        }
        for template in &source.templates {
            if ords.contains_key(&template.ord) {
                continue;
            }
            if let Some(dst) = target.template_index(&template.name) {
                ords.insert(template.ord, dst);
            } else if self.fallback_to_first {
                ords.insert(template.ord, 0);
            }
        }
        Ok(ords)
    }

    fn plan(&self, collection: &Collection) -> Result<MigrationPlan> {
        let source = collection.lookup_model(&self.source)?;
        let target = collection.lookup_model(&self.target)?;
        if source.id == target.id {
            return Err(AnkiError::Validation(
                "source and target model are the same".to_string(),
            ));
        }
        self.check_mapping(source, target)?;

        if source.is_cloze() || target.is_cloze() {
            if !(source.is_cloze() && target.is_cloze()) {
                return Err(AnkiError::Validation(
                    "notes can only move between two cloze models or two standard models"
                        .to_string(),
                ));
            }
            // Cloze card ordinals are cloze numbers and carry over as they are.
            return Ok(MigrationPlan {
                source_id: source.id,
                target_id: target.id,
                ords: None,
            });
        }

        let ords = self.template_ords(source, target)?;
        let mut slots: HashMap<i64, HashSet<usize>> = HashMap::new();
        for card in collection.cards_of_model(source.id) {
            let dst = ords.get(&card.ord).copied().ok_or_else(|| {
                let name = source
                    .templates
                    .get(card.ord)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| format!("#{}", card.ord));
                AnkiError::Validation(format!(
                    "template '{}' has no counterpart in model '{}'; map it or allow the fallback",
                    name, target.name
                ))
            })?;
            if !slots.entry(card.note_id).or_default().insert(dst) {
                return Err(AnkiError::Validation(format!(
                    "note {} would end up with two cards for target template {}",
                    card.note_id, dst
                )));
            }
        }

        Ok(MigrationPlan {
            source_id: source.id,
            target_id: target.id,
            ords: Some(ords),
        })
    }
}

impl Operation for MigrateNotes {
    fn name(&self) -> &'static str {
        "migrate-notes"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        self.plan(collection).map(|_| ())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let plan = self.plan(collection)?;
        let source_name = collection.model(plan.source_id)?.name.clone();
        let target_name = collection.model(plan.target_id)?.name.clone();
        let note_ids = collection.note_ids_of(plan.source_id);
        let mut cards = collection.cards_by_note();

        let ords = match plan.ords {
            Some(ords) => ords,
            None => collection
                .cards_of_model(plan.source_id)
                .iter()
                .map(|c| (c.ord, c.ord))
                .collect(),
        };

        let mut report = OperationReport::new(self.name());
        for note_id in &note_ids {
            let card_ids = cards.remove(note_id).unwrap_or_default();
            collection.migrate_note(*note_id, plan.target_id, &self.mapping, &ords, &card_ids)?;
            report.record(ChangeKind::Migrated, format!("/notes/{}", note_id));
        }
        debug!(
            "Migrated {} notes from {} to {}",
            note_ids.len(),
            source_name,
            target_name
        );

        Ok(report.with_message(if note_ids.is_empty() {
            format!("no notes found for model '{}'", source_name)
        } else {
            format!(
                "migrated {} note(s) from '{}' to '{}'",
                note_ids.len(),
                source_name,
                target_name
            )
        }))
    }
}

/// Add a tag to notes whose field matches a pattern anywhere in its value.
#[derive(Debug, Clone)]
pub struct TagNotes {
    /// Optional when the collection has a single model
    pub model: Option<String>,
    pub field: String,
    pub pattern: String,
    pub tag: String,
}

impl TagNotes {
    pub fn new(
        model: Option<String>,
        field: impl Into<String>,
        pattern: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            model,
            field: field.into(),
            pattern: pattern.into(),
            tag: tag.into(),
        }
    }

    fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern).map_err(|e| {
            AnkiError::Validation(format!("invalid pattern '{}': {}", self.pattern, e))
        })
    }
}

impl Operation for TagNotes {
    fn name(&self) -> &'static str {
        "tag-notes"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model_or_only(self.model.as_deref())?;
        if model.field_index(&self.field).is_none() {
            return Err(AnkiError::Validation(format!(
                "field '{}' does not exist in model '{}'",
                self.field, model.name
            )));
        }
        if self.tag.is_empty() || self.tag.chars().any(char::is_whitespace) {
            return Err(AnkiError::Validation(format!(
                "tag '{}' must be non-empty and contain no spaces",
                self.tag
            )));
        }
        self.compile().map(|_| ())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let pattern = self.compile()?;
        let model = collection.lookup_model_or_only(self.model.as_deref())?;
        let model_name = model.name.clone();
        let position = model.field_index(&self.field).ok_or_else(|| {
            AnkiError::Validation(format!("field '{}' does not exist", self.field))
        })?;

        let matches: Vec<i64> = collection
            .notes_of(model.id)
            .filter(|n| !n.has_tag(&self.tag))
            .filter(|n| n.fields.get(position).is_some_and(|v| pattern.is_match(v)))
            .map(|n| n.id)
            .collect();

        let mut report = OperationReport::new(self.name());
        for note_id in &matches {
            if let Some(note) = collection.notes.get_mut(note_id) {
                note.add_tag(&self.tag);
            }
            collection.touch_note(*note_id);
            report.record(ChangeKind::Tagged, format!("/notes/{}", note_id));
        }
        if !matches.is_empty() && !collection.tag_registry.contains_key(&self.tag) {
            collection
                .tag_registry
                .insert(self.tag.clone(), Value::from(-1));
        }

        Ok(report.with_message(format!(
            "tagged {} note(s) of model '{}' with '{}'",
            matches.len(),
            model_name,
            self.tag
        )))
    }
}

/// Delete notes whose chosen fields are all blank, with their cards.
#[derive(Debug, Clone)]
pub struct RemoveEmptyNotes {
    pub model: Option<String>,
    /// Fields that must all be blank; empty means every field
    pub fields: Vec<String>,
}

impl RemoveEmptyNotes {
    pub fn new(model: Option<String>, fields: Vec<String>) -> Self {
        Self { model, fields }
    }

    fn ords(&self, model: &Model) -> Result<Option<Vec<usize>>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        self.fields
            .iter()
            .map(|name| {
                model.field_index(name).ok_or_else(|| {
                    AnkiError::Validation(format!(
                        "field '{}' does not exist in model '{}'",
                        name, model.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

impl Operation for RemoveEmptyNotes {
    fn name(&self) -> &'static str {
        "remove-empty-notes"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        let model = collection.lookup_model_or_only(self.model.as_deref())?;
        self.ords(model).map(|_| ())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let model = collection.lookup_model_or_only(self.model.as_deref())?;
        let model_name = model.name.clone();
        let ords = self.ords(model)?;
        let doomed: Vec<i64> = collection
            .notes_of(model.id)
            .filter(|n| n.is_blank(ords.as_deref()))
            .map(|n| n.id)
            .collect();

        let (notes, cards) = collection.remove_notes(&doomed);
        let mut report = OperationReport::new(self.name()).with_message(format!(
            "removed {} empty note(s) and {} card(s) from model '{}'",
            notes, cards, model_name
        ));
        for note_id in doomed {
            report.record(ChangeKind::Removed, format!("/notes/{}", note_id));
        }
        Ok(report)
    }
}
