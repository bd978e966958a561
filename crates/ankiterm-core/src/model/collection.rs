//! The collection aggregate and its structural mutation primitives.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};

use super::identity::IdentityMap;
use super::note::{Card, CardId, Deck, DeckId, Grave, GraveKind, Note, NoteId};
use super::notetype::{Field, Model, ModelId, Template};
use super::{now_millis, now_secs};
use crate::error::{AnkiError, Result};

/// Source field name to target field name.
pub type FieldMapping = BTreeMap<String, String>;

/// The two on-disk schema shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// `collection.anki2`
    Anki2,
    /// `collection.anki21`
    Anki21,
}

impl SchemaGeneration {
    pub fn label(self) -> &'static str {
        match self {
            SchemaGeneration::Anki2 => "anki2",
            SchemaGeneration::Anki21 => "anki21",
        }
    }

    pub fn database_name(self) -> &'static str {
        match self {
            SchemaGeneration::Anki2 => crate::storage::DATABASE_ANKI2,
            SchemaGeneration::Anki21 => crate::storage::DATABASE_ANKI21,
        }
    }

    pub fn from_database_name(name: &str) -> Option<Self> {
        match name {
            crate::storage::DATABASE_ANKI2 => Some(SchemaGeneration::Anki2),
            crate::storage::DATABASE_ANKI21 => Some(SchemaGeneration::Anki21),
            _ => None,
        }
    }
}

/// Scalar columns of the `col` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMeta {
    pub id: i64,
    pub created: i64,
    /// Last modification, milliseconds
    pub modified: i64,
    pub schema_modified: i64,
    pub version: i64,
    pub dirty: i64,
    pub usn: i64,
    pub last_sync: i64,
}

/// Root aggregate: one per archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub generation: SchemaGeneration,
    pub meta: CollectionMeta,
    /// Global config; only `curModel`, `curDeck` and `schedVer` are interpreted
    pub conf: Map<String, Value>,
    pub models: IdentityMap<Model>,
    pub decks: IdentityMap<Deck>,
    pub deck_configs: Map<String, Value>,
    /// Tag registry from `col.tags`
    pub tag_registry: Map<String, Value>,
    pub notes: BTreeMap<NoteId, Note>,
    pub cards: BTreeMap<CardId, Card>,
    pub graves: Vec<Grave>,
}

fn conf_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_id(token: &str) -> Option<i64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

impl Collection {
    // --- Global config ---

    pub fn current_model_id(&self) -> Option<ModelId> {
        conf_id(self.conf.get("curModel"))
    }

    pub fn current_deck_id(&self) -> Option<DeckId> {
        conf_id(self.conf.get("curDeck"))
    }

    pub fn scheduler_version(&self) -> i64 {
        self.conf
            .get("schedVer")
            .and_then(Value::as_i64)
            .unwrap_or(1)
    }

    pub fn set_current_model(&mut self, id: ModelId) {
        self.conf.insert("curModel".to_string(), Value::from(id));
    }

    /// Bump the collection modification time after a committed change.
    pub fn mark_modified(&mut self) {
        self.meta.modified = now_millis().max(self.meta.modified + 1);
    }

    // --- Lookup ---

    pub fn model(&self, id: ModelId) -> Result<&Model> {
        self.models
            .get(id)
            .ok_or_else(|| AnkiError::not_found(id.to_string(), "/models"))
    }

    fn model_mut(&mut self, id: ModelId) -> Result<&mut Model> {
        self.models
            .get_mut(id)
            .ok_or_else(|| AnkiError::not_found(id.to_string(), "/models"))
    }

    /// Find a model by token: numeric tokens are tried as IDs first, then names.
    pub fn lookup_model(&self, token: &str) -> Result<&Model> {
        if let Some(model) = parse_id(token).and_then(|id| self.models.get(id)) {
            return Ok(model);
        }
        match self.models.by_name(token).as_slice() {
            [model] => Ok(model),
            [] => Err(AnkiError::not_found(token, "/models")),
            many => Err(AnkiError::Ambiguous {
                segment: token.to_string(),
                candidates: many.iter().map(|m| m.id).collect(),
            }),
        }
    }

    /// Resolve an optional model token, falling back to the only model.
    pub fn lookup_model_or_only(&self, token: Option<&str>) -> Result<&Model> {
        match token {
            Some(token) => self.lookup_model(token),
            None if self.models.len() == 1 => self.model(self.models.ids().next().unwrap_or(0)),
            None => Err(AnkiError::Validation(format!(
                "collection has {} models; name one",
                self.models.len()
            ))),
        }
    }

    pub fn lookup_deck(&self, token: &str) -> Result<&Deck> {
        if let Some(deck) = parse_id(token).and_then(|id| self.decks.get(id)) {
            return Ok(deck);
        }
        match self.decks.by_name(token).as_slice() {
            [deck] => Ok(deck),
            [] => Err(AnkiError::not_found(token, "/decks")),
            many => Err(AnkiError::Ambiguous {
                segment: token.to_string(),
                candidates: many.iter().map(|d| d.id).collect(),
            }),
        }
    }

    /// Note IDs of a model, ascending.
    pub fn note_ids_of(&self, model_id: ModelId) -> Vec<NoteId> {
        self.notes
            .values()
            .filter(|n| n.model_id == model_id)
            .map(|n| n.id)
            .collect()
    }

    pub fn notes_of(&self, model_id: ModelId) -> impl Iterator<Item = &Note> {
        self.notes.values().filter(move |n| n.model_id == model_id)
    }

    /// Cards of all notes of a model, by card ID.
    pub fn cards_of_model(&self, model_id: ModelId) -> Vec<&Card> {
        self.cards
            .values()
            .filter(|c| {
                self.notes
                    .get(&c.note_id)
                    .is_some_and(|n| n.model_id == model_id)
            })
            .collect()
    }

    /// Card IDs grouped by owning note.
    pub fn cards_by_note(&self) -> HashMap<NoteId, Vec<CardId>> {
        let mut index: HashMap<NoteId, Vec<CardId>> = HashMap::new();
        for card in self.cards.values() {
            index.entry(card.note_id).or_default().push(card.id);
        }
        index
    }

    /// ID for a new model: after every existing ID and no earlier than now.
    pub fn next_model_id(&self) -> ModelId {
        self.models.max_id().unwrap_or(0).max(now_millis()) + 1
    }

    /// ID for a new deck: after every existing ID and no earlier than now.
    pub fn next_deck_id(&self) -> DeckId {
        self.decks.max_id().unwrap_or(0).max(now_millis()) + 1
    }

    // --- Change stamping ---

    fn touch_model(&mut self, id: ModelId) {
        if let Some(model) = self.models.get_mut(id) {
            model.modified = now_secs();
            model.usn = -1;
        }
    }

    /// Recompute derived note columns after its values changed.
    pub fn touch_note(&mut self, note_id: NoteId) {
        let sortf = match self
            .notes
            .get(&note_id)
            .and_then(|n| self.models.get(n.model_id))
        {
            Some(model) => model.sortf,
            None => 0,
        };
        if let Some(note) = self.notes.get_mut(&note_id) {
            note.refresh(sortf, now_secs());
        }
    }

    // --- Structural primitives ---

    /// Add a model. Its name must be unique.
    pub fn add_model(&mut self, model: Model) -> Result<()> {
        if !self.models.by_name(&model.name).is_empty() {
            return Err(AnkiError::Validation(format!(
                "model '{}' already exists",
                model.name
            )));
        }
        let id = model.id;
        if !self.models.insert(model) {
            return Err(AnkiError::Validation(format!("model id {} already exists", id)));
        }
        self.touch_model(id);
        Ok(())
    }

    pub fn rename_model(&mut self, model_id: ModelId, new_name: &str) -> Result<()> {
        if new_name.trim().is_empty() {
            return Err(AnkiError::Validation("model name cannot be empty".to_string()));
        }
        if self.models.by_name(new_name).iter().any(|m| m.id != model_id) {
            return Err(AnkiError::Validation(format!(
                "model '{}' already exists",
                new_name
            )));
        }
        self.model_mut(model_id)?.name = new_name.to_string();
        self.touch_model(model_id);
        Ok(())
    }

    /// Create an empty deck using the default options group.
    pub fn add_deck(&mut self, name: &str) -> Result<DeckId> {
        if name.trim().is_empty() {
            return Err(AnkiError::Validation("deck name cannot be empty".to_string()));
        }
        if !self.decks.by_name(name).is_empty() {
            return Err(AnkiError::Validation(format!("deck '{}' already exists", name)));
        }
        let id = self.next_deck_id();
        let mut raw = Map::new();
        raw.insert("mod".to_string(), Value::from(now_secs()));
        raw.insert("usn".to_string(), Value::from(-1));
        raw.insert("desc".to_string(), Value::from(""));
        raw.insert("dyn".to_string(), Value::from(0));
        raw.insert("conf".to_string(), Value::from(1));
        raw.insert("collapsed".to_string(), Value::from(false));
        raw.insert("browserCollapsed".to_string(), Value::from(false));
        raw.insert("extendNew".to_string(), Value::from(0));
        raw.insert("extendRev".to_string(), Value::from(0));
        for key in ["newToday", "revToday", "lrnToday", "timeToday"] {
            raw.insert(key.to_string(), Value::from(vec![0, 0]));
        }
        self.decks.insert(Deck {
            id,
            name: name.to_string(),
            raw,
        });
        Ok(id)
    }

    /// Put a card in another deck.
    pub fn move_card(&mut self, card_id: CardId, deck_id: DeckId) -> Result<()> {
        if self.decks.get(deck_id).is_none() {
            return Err(AnkiError::not_found(deck_id.to_string(), "/decks"));
        }
        let card = self
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| AnkiError::not_found(card_id.to_string(), "/cards"))?;
        if card.deck_id != deck_id {
            card.deck_id = deck_id;
            card.modified = now_secs();
            card.usn = -1;
        }
        Ok(())
    }

    /// Insert a field at `position` (default: append) and give every existing
    /// note of the model `default` at that position. Returns the ordinal.
    pub fn add_field_at(
        &mut self,
        model_id: ModelId,
        name: &str,
        position: Option<usize>,
        default: &str,
    ) -> Result<usize> {
        let model = self.model_mut(model_id)?;
        if name.trim().is_empty() {
            return Err(AnkiError::Validation("field name cannot be empty".to_string()));
        }
        if model.field_index(name).is_some() {
            return Err(AnkiError::Validation(format!(
                "field '{}' already exists in model '{}'",
                name, model.name
            )));
        }
        let len = model.fields.len();
        let position = position.unwrap_or(len);
        if position > len {
            return Err(AnkiError::Validation(format!(
                "position {} is past the end of model '{}' ({} fields)",
                position, model.name, len
            )));
        }

        model.fields.insert(position, Field::new(name, position));
        model.renumber_fields();
        if model.sortf >= position && position < len {
            model.sortf += 1;
        }
        model.remap_req_fields(|ord| Some(if ord >= position { ord + 1 } else { ord }));

        let note_ids = self.note_ids_of(model_id);
        for id in &note_ids {
            if let Some(note) = self.notes.get_mut(id) {
                note.fields.insert(position, default.to_string());
            }
        }
        if position == 0 || !default.is_empty() {
            for id in note_ids {
                self.touch_note(id);
            }
        }
        self.touch_model(model_id);
        Ok(position)
    }

    /// Remove a field and its value from every note of the model.
    /// Returns the removed ordinal.
    pub fn remove_field(&mut self, model_id: ModelId, name: &str) -> Result<usize> {
        let model = self.model_mut(model_id)?;
        let position = model.field_index(name).ok_or_else(|| {
            AnkiError::Validation(format!(
                "field '{}' does not exist in model '{}'",
                name, model.name
            ))
        })?;
        if model.fields.len() == 1 {
            return Err(AnkiError::Validation(format!(
                "cannot remove the last field of model '{}'",
                model.name
            )));
        }
        if model.fields[position].prevent_deletion {
            return Err(AnkiError::Validation(format!(
                "field '{}' is protected from deletion",
                name
            )));
        }

        model.fields.remove(position);
        model.renumber_fields();
        if model.sortf == position {
            model.sortf = 0;
        } else if model.sortf > position {
            model.sortf -= 1;
        }
        model.remap_req_fields(|ord| match ord {
            o if o == position => None,
            o if o > position => Some(o - 1),
            o => Some(o),
        });

        let note_ids = self.note_ids_of(model_id);
        for id in &note_ids {
            if let Some(note) = self.notes.get_mut(id) {
                if position < note.fields.len() {
                    note.fields.remove(position);
                }
            }
        }
        for id in note_ids {
            self.touch_note(id);
        }
        self.touch_model(model_id);
        Ok(position)
    }

    /// Rename a field and rewrite template references to it. Note values are
    /// positional and stay as they are. Returns how many templates changed.
    pub fn rename_field(&mut self, model_id: ModelId, old: &str, new: &str) -> Result<usize> {
        let model = self.model_mut(model_id)?;
        let position = model.field_index(old).ok_or_else(|| {
            AnkiError::Validation(format!(
                "field '{}' does not exist in model '{}'",
                old, model.name
            ))
        })?;
        if new.trim().is_empty() {
            return Err(AnkiError::Validation("field name cannot be empty".to_string()));
        }
        if old == new {
            return Ok(0);
        }
        if model.field_index(new).is_some() {
            return Err(AnkiError::Validation(format!(
                "field '{}' already exists in model '{}'",
                new, model.name
            )));
        }

        model.fields[position].name = new.to_string();
        let mut changed = 0;
        for template in model.templates.iter_mut() {
            if template.rename_field_references(old, new) {
                changed += 1;
            }
        }
        self.touch_model(model_id);
        Ok(changed)
    }

    /// Append a template. No cards are generated for it.
    pub fn add_template(&mut self, model_id: ModelId, mut template: Template) -> Result<usize> {
        let model = self.model_mut(model_id)?;
        if model.template_index(&template.name).is_some() {
            return Err(AnkiError::Validation(format!(
                "template '{}' already exists in model '{}'",
                template.name, model.name
            )));
        }
        let ord = model.templates.len();
        template.ord = ord;
        model.templates.push(template);
        if let Some(rows) = model.req.as_array_mut() {
            rows.push(serde_json::json!([ord, "none", []]));
        }
        self.touch_model(model_id);
        Ok(ord)
    }

    /// Compute migrated values for one note without touching the collection.
    ///
    /// Target fields absent from the mapping get an empty string; source
    /// fields absent from the mapping are dropped.
    pub fn map_field_values(
        source: &Model,
        target: &Model,
        values: &[String],
        mapping: &FieldMapping,
    ) -> Result<Vec<String>> {
        let mut out = vec![String::new(); target.fields.len()];
        for (from, to) in mapping {
            let src = source.field_index(from).ok_or_else(|| {
                AnkiError::Validation(format!(
                    "field '{}' does not exist in source model '{}'",
                    from, source.name
                ))
            })?;
            let dst = target.field_index(to).ok_or_else(|| {
                AnkiError::Validation(format!(
                    "field '{}' does not exist in target model '{}'",
                    to, target.name
                ))
            })?;
            out[dst] = values.get(src).cloned().unwrap_or_default();
        }
        Ok(out)
    }

    /// Move a note to another model, remapping its values, and re-point its
    /// cards through `template_map` (source ordinal to target ordinal).
    pub fn migrate_note(
        &mut self,
        note_id: NoteId,
        target_model_id: ModelId,
        mapping: &FieldMapping,
        template_map: &HashMap<usize, usize>,
        card_ids: &[CardId],
    ) -> Result<()> {
        let note = self
            .notes
            .get(&note_id)
            .ok_or_else(|| AnkiError::not_found(note_id.to_string(), "/notes"))?;
        let source = self.model(note.model_id)?;
        let target = self.model(target_model_id)?;
        let values = Self::map_field_values(source, target, &note.fields, mapping)?;

        for card_id in card_ids {
            if let Some(card) = self.cards.get_mut(card_id) {
                let ord = template_map.get(&card.ord).copied().ok_or_else(|| {
                    AnkiError::Validation(format!(
                        "card {} uses template ordinal {} with no target template",
                        card.id, card.ord
                    ))
                })?;
                card.ord = ord;
                card.modified = now_secs();
                card.usn = -1;
            }
        }

        if let Some(note) = self.notes.get_mut(&note_id) {
            note.model_id = target_model_id;
            note.fields = values;
        }
        self.touch_note(note_id);
        Ok(())
    }

    /// Delete notes with their cards, recording graves. Returns
    /// `(notes removed, cards removed)`.
    pub fn remove_notes(&mut self, note_ids: &[NoteId]) -> (usize, usize) {
        let doomed: HashSet<NoteId> = note_ids.iter().copied().collect();
        let card_ids: Vec<CardId> = self
            .cards
            .values()
            .filter(|c| doomed.contains(&c.note_id))
            .map(|c| c.id)
            .collect();

        for id in &card_ids {
            self.cards.remove(id);
            self.graves.push(Grave {
                usn: -1,
                oid: *id,
                kind: GraveKind::Card,
            });
        }
        let mut removed = 0;
        for id in note_ids {
            if self.notes.remove(id).is_some() {
                removed += 1;
                self.graves.push(Grave {
                    usn: -1,
                    oid: *id,
                    kind: GraveKind::Note,
                });
            }
        }
        (removed, card_ids.len())
    }

    // --- Integrity ---

    /// Every invariant violation currently present.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for model in &self.models {
            let mut names = HashSet::new();
            for (i, field) in model.fields.iter().enumerate() {
                if field.ord != i {
                    issues.push(format!(
                        "model {} field '{}' has ordinal {} at position {}",
                        model.id, field.name, field.ord, i
                    ));
                }
                if !names.insert(field.name.as_str()) {
                    issues.push(format!(
                        "model {} has duplicate field '{}'",
                        model.id, field.name
                    ));
                }
            }
            let mut names = HashSet::new();
            for (i, template) in model.templates.iter().enumerate() {
                if template.ord != i {
                    issues.push(format!(
                        "model {} template '{}' has ordinal {} at position {}",
                        model.id, template.name, template.ord, i
                    ));
                }
                if !names.insert(template.name.as_str()) {
                    issues.push(format!(
                        "model {} has duplicate template '{}'",
                        model.id, template.name
                    ));
                }
            }
            if model.sortf >= model.fields.len().max(1) {
                issues.push(format!(
                    "model {} sort field {} is out of range",
                    model.id, model.sortf
                ));
            }
        }

        for note in self.notes.values() {
            match self.models.get(note.model_id) {
                None => issues.push(format!(
                    "note {} references missing model {}",
                    note.id, note.model_id
                )),
                Some(model) if model.fields.len() != note.fields.len() => issues.push(format!(
                    "note {} has {} values but model {} has {} fields",
                    note.id,
                    note.fields.len(),
                    model.id,
                    model.fields.len()
                )),
                Some(_) => {}
            }
        }

        let mut slots = HashSet::new();
        for card in self.cards.values() {
            let note = match self.notes.get(&card.note_id) {
                Some(note) => note,
                None => {
                    issues.push(format!(
                        "card {} references missing note {}",
                        card.id, card.note_id
                    ));
                    continue;
                }
            };
            if let Some(model) = self.models.get(note.model_id) {
                if !model.is_cloze() && card.ord >= model.templates.len() {
                    issues.push(format!(
                        "card {} uses template ordinal {} but model {} has {} templates",
                        card.id,
                        card.ord,
                        model.id,
                        model.templates.len()
                    ));
                }
            }
            if !slots.insert((card.note_id, card.ord)) {
                issues.push(format!(
                    "note {} has more than one card for ordinal {}",
                    card.note_id, card.ord
                ));
            }
        }

        issues
    }

    /// Fail with `Integrity` if any invariant is violated.
    pub fn check_integrity(&self) -> Result<()> {
        let issues = self.integrity_issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(AnkiError::Integrity(issues.join("; ")))
        }
    }
}
