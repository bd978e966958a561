//! Read-only queries over a collection.

use serde_json::{json, Value};

use super::{OperationReport, Query};
use crate::error::{AnkiError, Result};
use crate::model::Collection;
use crate::path::{resolve_locator, Locator};

/// List whatever an address resolves to.
#[derive(Debug, Clone)]
pub struct ListOp {
    pub path: Locator,
    /// Truncate sets to this many items
    pub limit: Option<usize>,
}

impl ListOp {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: Locator::parse(path)?,
            limit: None,
        })
    }
}

impl Query for ListOp {
    fn name(&self) -> &'static str {
        "list"
    }

    fn run(&self, collection: &Collection) -> Result<OperationReport> {
        let resolved = resolve_locator(collection, &self.path)?;
        let count = resolved.count();
        let shown = self.limit.filter(|&l| l > 0).map_or(count, |l| l.min(count));
        let message = if shown < count {
            format!("{} of {} item(s) at {}", shown, count, self.path)
        } else {
            format!("{} item(s) at {}", count, self.path)
        };
        Ok(OperationReport::new(self.name())
            .with_message(message)
            .with_data(resolved.to_json(collection, self.limit)))
    }
}

/// Characters of each field value shown by `get` on an example note.
pub const EXAMPLE_PREVIEW_CHARS: usize = 100;

/// Show one object: a model, field, template, stylesheet or example note.
#[derive(Debug, Clone)]
pub struct GetOp {
    pub path: Locator,
}

impl GetOp {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: Locator::parse(path)?,
        })
    }
}

fn preview(value: &mut Value) {
    if let Some(fields) = value
        .pointer_mut("/example/fields")
        .and_then(Value::as_object_mut)
    {
        for text in fields.values_mut() {
            if let Some(s) = text.as_str() {
                if s.chars().count() > EXAMPLE_PREVIEW_CHARS {
                    let cut: String = s.chars().take(EXAMPLE_PREVIEW_CHARS).collect();
                    *text = Value::String(format!("{}...", cut));
                }
            }
        }
    }
}

impl Query for GetOp {
    fn name(&self) -> &'static str {
        "get"
    }

    fn run(&self, collection: &Collection) -> Result<OperationReport> {
        let resolved = resolve_locator(collection, &self.path)?;
        if resolved.is_set() {
            return Err(AnkiError::InvalidPath(format!(
                "'{}' names a set; use list",
                self.path
            )));
        }
        let mut data = resolved.to_json(collection, None);
        preview(&mut data);
        Ok(OperationReport::new(self.name())
            .with_message(self.path.to_string())
            .with_data(data))
    }
}

/// Count the objects an address resolves to.
#[derive(Debug, Clone)]
pub struct CountOp {
    pub path: Locator,
}

impl CountOp {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            path: Locator::parse(path)?,
        })
    }
}

impl Query for CountOp {
    fn name(&self) -> &'static str {
        "count"
    }

    fn run(&self, collection: &Collection) -> Result<OperationReport> {
        let count = resolve_locator(collection, &self.path)?.count();
        Ok(OperationReport::new(self.name())
            .with_message(format!("{} item(s) at {}", count, self.path))
            .with_data(json!({ "path": self.path.to_string(), "count": count })))
    }
}

/// Bird's-eye summary of a collection.
#[derive(Debug, Clone, Default)]
pub struct InfoOp {
    /// Media files in the archive, when known
    pub media_files: Option<usize>,
}

impl Query for InfoOp {
    fn name(&self) -> &'static str {
        "info"
    }

    fn run(&self, collection: &Collection) -> Result<OperationReport> {
        let cards_by_note = collection.cards_by_note();
        let models: Vec<_> = collection
            .models
            .iter()
            .map(|m| {
                let notes = collection.note_ids_of(m.id);
                let cards: usize = notes
                    .iter()
                    .map(|id| cards_by_note.get(id).map_or(0, Vec::len))
                    .sum();
                json!({
                    "id": m.id,
                    "name": m.name,
                    "type": m.kind.label(),
                    "notes": notes.len(),
                    "cards": cards,
                    "fields": m.field_names(),
                    "templates": m.templates.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let decks: Vec<_> = collection
            .decks
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "name": d.name,
                    "cards": collection.cards.values().filter(|c| c.deck_id == d.id).count(),
                })
            })
            .collect();

        let data = json!({
            "generation": collection.generation.label(),
            "scheduler": collection.scheduler_version(),
            "notes": collection.notes.len(),
            "cards": collection.cards.len(),
            "media": self.media_files,
            "models": models,
            "decks": decks,
        });
        Ok(OperationReport::new(self.name())
            .with_message(format!(
                "{} collection: {} model(s), {} note(s), {} card(s)",
                collection.generation.label(),
                collection.models.len(),
                collection.notes.len(),
                collection.cards.len()
            ))
            .with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection_fixture;

    #[test]
    fn test_list_fields() {
        let collection = collection_fixture();
        let report = ListOp::new("/models/Basic/fields").unwrap().run(&collection).unwrap();
        let data = report.data.unwrap();
        assert_eq!(data["fields"][0]["name"], "Front");
        assert_eq!(data["fields"][1]["name"], "Back");
    }

    #[test]
    fn test_list_limit_in_message() {
        let collection = collection_fixture();
        let mut op = ListOp::new("/notes").unwrap();
        op.limit = Some(1);
        let report = op.run(&collection).unwrap();
        assert_eq!(report.message, "1 of 2 item(s) at /notes");
        assert_eq!(report.data.unwrap()["notes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_get_single_objects() {
        let collection = collection_fixture();
        let data = GetOp::new("/models/Basic/fields/Back")
            .unwrap()
            .run(&collection)
            .unwrap()
            .data
            .unwrap();
        assert_eq!(data["field"]["ord"], 1);

        let data = GetOp::new("/models/Basic").unwrap().run(&collection).unwrap().data.unwrap();
        assert_eq!(data["fields"][0], "Front");
        assert_eq!(data["type"], "Standard");
    }

    #[test]
    fn test_get_rejects_sets() {
        let collection = collection_fixture();
        for path in ["/models/Basic/fields", "/notes/Basic"] {
            let err = GetOp::new(path).unwrap().run(&collection).unwrap_err();
            assert!(matches!(err, AnkiError::InvalidPath(_)), "{}", path);
        }
        let note = GetOp::new("/notes/10").unwrap().run(&collection).unwrap();
        assert_eq!(note.data.unwrap()["id"], 10);
    }

    #[test]
    fn test_get_example_shortens_long_values() {
        let mut collection = collection_fixture();
        if let Some(note) = collection.notes.get_mut(&10) {
            note.fields[1] = "x".repeat(150);
        }
        let data = GetOp::new("/models/Basic/example")
            .unwrap()
            .run(&collection)
            .unwrap()
            .data
            .unwrap();
        let back = data["example"]["fields"]["Back"].as_str().unwrap();
        assert_eq!(back.len(), EXAMPLE_PREVIEW_CHARS + 3);
        assert_eq!(data["example"]["fields"]["Front"], "猫好き");
    }

    #[test]
    fn test_count_not_found() {
        let collection = collection_fixture();
        let err = CountOp::new("/models/Basic/fields/Nonexistent")
            .unwrap()
            .run(&collection)
            .unwrap_err();
        assert!(matches!(err, AnkiError::NotFound { ref segment, .. } if segment == "Nonexistent"));
    }

    #[test]
    fn test_info_summary() {
        let collection = collection_fixture();
        let report = InfoOp { media_files: Some(3) }.run(&collection).unwrap();
        let data = report.data.unwrap();
        assert_eq!(data["generation"], "anki21");
        assert_eq!(data["models"][0]["notes"], 2);
        assert_eq!(data["models"][0]["cards"], 2);
        assert_eq!(data["decks"][0]["cards"], 2);
        assert_eq!(data["media"], 3);
    }
}
