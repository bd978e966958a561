//! Field populators: rules that derive field values for each note of a model.
//!
//! Populators are configured from a JSON object, validated against the target
//! model, and then invoked once per note. Invocation is async so that
//! populators backed by a network service can run several notes at once.

mod brackets;
mod concat;
mod copy;
mod furigana;
mod llm;
mod runner;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{AnkiError, Result};
use crate::model::{Model, Note, NoteId};

pub use brackets::RemoveBrackets;
pub use concat::ConcatFields;
pub use copy::CopyField;
pub use furigana::{annotate, strip_annotations, Furigana};
pub use llm::{Analysis, AnnotationService, JapLlm, OpenAiAnnotator, WordNote};
pub use runner::{run_batch, run_blocking, BatchSettings, NoteOutcome};

/// Populator options, as read from a JSON config file.
pub type PopulatorConfig = Map<String, Value>;

/// New values keyed by target field name.
pub type FieldUpdates = BTreeMap<String, String>;

/// The view of a note handed to a populator.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteInput {
    pub note_id: NoteId,
    /// Field name to value, for every field of the model
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

impl NoteInput {
    pub fn from_note(model: &Model, note: &Note) -> Self {
        let fields = model
            .fields
            .iter()
            .zip(note.fields.iter())
            .map(|(f, v)| (f.name.clone(), v.clone()))
            .collect();
        Self {
            note_id: note.id,
            fields,
            tags: note.tags.clone(),
        }
    }

    /// Value of a field, or `InvalidInput` if the note has no such field.
    pub fn field(&self, name: &str) -> Result<&str> {
        self.fields.get(name).map(String::as_str).ok_or_else(|| {
            AnkiError::InvalidInput(format!(
                "note {} has no field '{}'",
                self.note_id, name
            ))
        })
    }
}

/// A rule deriving target field values from a note.
#[async_trait]
pub trait Populator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read options. Called once before validation.
    fn configure(&mut self, config: &PopulatorConfig) -> Result<()>;

    fn source_fields(&self) -> Vec<String>;

    fn target_fields(&self) -> Vec<String>;

    /// Check that every field the populator names exists in `model`.
    fn validate(&self, model: &Model) -> Result<()> {
        let missing: Vec<String> = self
            .source_fields()
            .into_iter()
            .chain(self.target_fields())
            .filter(|name| model.field_index(name).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnkiError::Validation(format!(
                "fields not found in model '{}': {}",
                model.name,
                missing.join(", ")
            )))
        }
    }

    /// Preferred number of notes in flight at once.
    fn concurrency(&self) -> usize {
        1
    }

    /// Per-note time limit the populator asks for, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Compute updates for one note. An empty map means nothing to change.
    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates>;
}

/// Shared flag that stops a batch from starting further notes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A registered populator.
pub struct PopulatorInfo {
    pub name: &'static str,
    pub description: &'static str,
    factory: fn() -> Box<dyn Populator>,
}

static REGISTRY: &[PopulatorInfo] = &[
    PopulatorInfo {
        name: "copy-field",
        description: "Copy one field into another",
        factory: || Box::new(CopyField::default()),
    },
    PopulatorInfo {
        name: "concat-fields",
        description: "Join several fields into a target field",
        factory: || Box::new(ConcatFields::default()),
    },
    PopulatorInfo {
        name: "remove-brackets",
        description: "Remove text in round brackets, half or full width",
        factory: || Box::new(RemoveBrackets::default()),
    },
    PopulatorInfo {
        name: "furigana",
        description: "Annotate kanji with readings from a dictionary",
        factory: || Box::new(Furigana::default()),
    },
    PopulatorInfo {
        name: "jap-llm",
        description: "Translate and break down Japanese sentences with an OpenAI model",
        factory: || Box::new(JapLlm::default()),
    },
];

/// Every built-in populator.
pub fn registry() -> &'static [PopulatorInfo] {
    REGISTRY
}

/// Instantiate and configure a populator by name.
pub fn create(name: &str, config: &PopulatorConfig) -> Result<Box<dyn Populator>> {
    let info = REGISTRY.iter().find(|p| p.name == name).ok_or_else(|| {
        AnkiError::Validation(format!(
            "unknown populator '{}' (available: {})",
            name,
            REGISTRY
                .iter()
                .map(|p| p.name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;
    let mut populator = (info.factory)();
    populator.configure(config)?;
    Ok(populator)
}

// --- Config helpers ---

pub(crate) fn required_str(config: &PopulatorConfig, key: &str) -> Result<String> {
    optional_str(config, key)?
        .ok_or_else(|| AnkiError::Validation(format!("populator option '{}' is required", key)))
}

pub(crate) fn optional_str(config: &PopulatorConfig, key: &str) -> Result<Option<String>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AnkiError::Validation(format!(
            "populator option '{}' must be a string, found {}",
            key, other
        ))),
    }
}

pub(crate) fn optional_u64(config: &PopulatorConfig, key: &str) -> Result<Option<u64>> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            AnkiError::Validation(format!(
                "populator option '{}' must be a non-negative integer",
                key
            ))
        }),
    }
}

pub(crate) fn required_list(config: &PopulatorConfig, key: &str) -> Result<Vec<String>> {
    let items = config
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| AnkiError::Validation(format!("populator option '{}' must be an array", key)))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                AnkiError::Validation(format!("populator option '{}' must hold strings", key))
            })
        })
        .collect()
}
