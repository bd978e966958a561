//! Schema adapter between raw collection rows and the object model.
//!
//! Both on-disk generations load into the same in-memory shape. Serializing
//! writes back in the generation the collection was loaded from, and reuses
//! the baseline's stored text wherever the value did not change so that an
//! untouched collection round-trips to identical rows.

mod json;

use std::collections::{BTreeMap, HashMap};

use log::debug;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use crate::error::{AnkiError, Result};
use crate::model::{
    join_tags, parse_tags, Card, Collection, CollectionMeta, Grave, GraveKind, IdentityMap, Note,
    SchemaGeneration,
};
use crate::storage::{CardRow, ColRow, GraveRow, NoteRow, RawCollection};

/// Separator between field values in `notes.flds`.
pub const FIELD_SEPARATOR: char = '\x1f';

/// Decide the schema generation of a collection.
///
/// The archive entry name is authoritative when known; otherwise the models
/// column is searched for generation 21 attributes.
pub fn detect_generation(
    models: &Map<String, Value>,
    hint: Option<SchemaGeneration>,
) -> SchemaGeneration {
    match hint {
        Some(generation) => generation,
        None if json::has_anki21_keys(models) => SchemaGeneration::Anki21,
        None => SchemaGeneration::Anki2,
    }
}

fn sql_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) => s.clone(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        SqlValue::Null => String::new(),
    }
}

fn to_usize(value: i64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| AnkiError::Schema(format!("{} is negative: {}", what, value)))
}

/// Build a collection from raw rows.
///
/// # Errors
///
/// Returns `AnkiError::Schema` for malformed JSON columns or a note holding
/// more values than its model has fields.
pub fn load(raw: &RawCollection, hint: Option<SchemaGeneration>) -> Result<Collection> {
    let col = &raw.col;
    let models_json = json::parse_object(&col.models, "models")?;
    let generation = detect_generation(&models_json, hint);

    let mut models = IdentityMap::new();
    for (key, value) in models_json {
        let model = json::parse_model(&key, value, generation)?;
        let id = model.id;
        if !models.insert(model) {
            return Err(AnkiError::Schema(format!("duplicate model id {}", id)));
        }
    }

    let mut decks = IdentityMap::new();
    for (key, value) in json::parse_object(&col.decks, "decks")? {
        let deck = json::parse_deck(&key, value)?;
        let id = deck.id;
        if !decks.insert(deck) {
            return Err(AnkiError::Schema(format!("duplicate deck id {}", id)));
        }
    }

    let mut notes = BTreeMap::new();
    for row in &raw.notes {
        let mut fields: Vec<String> = row.flds.split(FIELD_SEPARATOR).map(str::to_string).collect();
        if let Some(model) = models.get(row.mid) {
            let expected = model.fields.len();
            if fields.len() > expected {
                return Err(AnkiError::Schema(format!(
                    "note {} has {} values but model '{}' has {} fields",
                    row.id,
                    fields.len(),
                    model.name,
                    expected
                )));
            }
            fields.resize(expected, String::new());
        }
        notes.insert(
            row.id,
            Note {
                id: row.id,
                guid: row.guid.clone(),
                model_id: row.mid,
                modified: row.modified,
                usn: row.usn,
                tags: parse_tags(&row.tags),
                fields,
                sort_field: sql_text(&row.sfld),
                checksum: row.csum,
                flags: row.flags,
                data: row.data.clone(),
            },
        );
    }

    let mut cards = BTreeMap::new();
    for row in &raw.cards {
        cards.insert(
            row.id,
            Card {
                id: row.id,
                note_id: row.nid,
                deck_id: row.did,
                ord: to_usize(row.ord, &format!("card {} ord", row.id))?,
                modified: row.modified,
                usn: row.usn,
                card_type: row.card_type,
                queue: row.queue,
                due: row.due,
                interval: row.ivl,
                factor: row.factor,
                reps: row.reps,
                lapses: row.lapses,
                left: row.left,
                original_due: row.odue,
                original_deck: row.odid,
                flags: row.flags,
                data: row.data.clone(),
            },
        );
    }

    let graves = raw
        .graves
        .iter()
        .map(|g| Grave {
            usn: g.usn,
            oid: g.oid,
            kind: GraveKind::from_code(g.kind),
        })
        .collect();

    debug!(
        "Loaded {} collection: {} models, {} decks, {} notes, {} cards",
        generation.label(),
        models.len(),
        decks.len(),
        notes.len(),
        cards.len()
    );

    Ok(Collection {
        generation,
        meta: CollectionMeta {
            id: col.id,
            created: col.crt,
            modified: col.modified,
            schema_modified: col.scm,
            version: col.ver,
            dirty: col.dty,
            usn: col.usn,
            last_sync: col.ls,
        },
        conf: json::parse_object(&col.conf, "conf")?,
        models,
        decks,
        deck_configs: json::parse_object(&col.dconf, "dconf")?,
        tag_registry: json::parse_object(&col.tags, "tags")?,
        notes,
        cards,
        graves,
    })
}

/// Turn a collection back into raw rows in its own generation's shape.
///
/// With a `baseline`, stored text is reused for every value that did not
/// change: JSON columns, tag strings and sort fields.
pub fn serialize(collection: &Collection, baseline: Option<&RawCollection>) -> Result<RawCollection> {
    let generation = collection.generation;
    let base_col = baseline.map(|b| &b.col);

    let mut models = Map::new();
    for model in &collection.models {
        models.insert(model.id.to_string(), json::model_json(model, generation));
    }
    let mut decks = Map::new();
    for deck in &collection.decks {
        decks.insert(deck.id.to_string(), json::deck_json(deck));
    }

    let meta = &collection.meta;
    let col = ColRow {
        id: meta.id,
        crt: meta.created,
        modified: meta.modified,
        scm: meta.schema_modified,
        ver: meta.version,
        dty: meta.dirty,
        usn: meta.usn,
        ls: meta.last_sync,
        conf: json::column_text(&collection.conf, base_col.map(|c| c.conf.as_str()))?,
        models: json::column_text(&models, base_col.map(|c| c.models.as_str()))?,
        decks: json::column_text(&decks, base_col.map(|c| c.decks.as_str()))?,
        dconf: json::column_text(&collection.deck_configs, base_col.map(|c| c.dconf.as_str()))?,
        tags: json::column_text(&collection.tag_registry, base_col.map(|c| c.tags.as_str()))?,
    };

    let base_notes: HashMap<i64, &NoteRow> = baseline
        .map(|b| b.notes.iter().map(|n| (n.id, n)).collect())
        .unwrap_or_default();

    let notes = collection
        .notes
        .values()
        .map(|note| {
            let base = base_notes.get(&note.id);
            let tags = match base {
                Some(row) if parse_tags(&row.tags) == note.tags => row.tags.clone(),
                _ => join_tags(&note.tags),
            };
            let sfld = match base {
                Some(row) if sql_text(&row.sfld) == note.sort_field => row.sfld.clone(),
                _ => SqlValue::Text(note.sort_field.clone()),
            };
            NoteRow {
                id: note.id,
                guid: note.guid.clone(),
                mid: note.model_id,
                modified: note.modified,
                usn: note.usn,
                tags,
                flds: note.fields.join(&FIELD_SEPARATOR.to_string()),
                sfld,
                csum: note.checksum,
                flags: note.flags,
                data: note.data.clone(),
            }
        })
        .collect();

    let cards = collection
        .cards
        .values()
        .map(|card| CardRow {
            id: card.id,
            nid: card.note_id,
            did: card.deck_id,
            ord: card.ord as i64,
            modified: card.modified,
            usn: card.usn,
            card_type: card.card_type,
            queue: card.queue,
            due: card.due,
            ivl: card.interval,
            factor: card.factor,
            reps: card.reps,
            lapses: card.lapses,
            left: card.left,
            odue: card.original_due,
            odid: card.original_deck,
            flags: card.flags,
            data: card.data.clone(),
        })
        .collect();

    let graves = collection
        .graves
        .iter()
        .map(|g| GraveRow {
            usn: g.usn,
            oid: g.oid,
            kind: g.kind.code(),
        })
        .collect();

    Ok(RawCollection {
        col,
        notes,
        cards,
        graves,
    })
}
