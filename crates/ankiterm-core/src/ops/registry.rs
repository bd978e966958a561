//! Build write operations from JSON, for batch scripts.
//!
//! A script step looks like `{"op": "rename-field", "args": {...}}`; the
//! argument keys match the CLI flags with dashes turned into underscores.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::models::TemplateSpec;
use super::{
    AddField, AddModel, AddTemplate, DivideDecks, MigrateNotes, Operation, PopulateFields, RemoveEmptyNotes,
    RemoveField, RenameField, RenameModel, TagNotes,
};
use crate::error::{AnkiError, Result};
use crate::model::FieldMapping;
use crate::populators::{self, BatchSettings, PopulatorConfig};

/// Names accepted by [`from_json`].
pub const OPERATION_NAMES: &[&str] = &[
    "rename-field",
    "add-field",
    "remove-field",
    "add-model",
    "rename-model",
    "add-template",
    "migrate-notes",
    "tag-notes",
    "remove-empty-notes",
    "divide-decks-by-tags",
    "populate-fields",
];

const READ_OPERATIONS: &[&str] = &["list", "get", "count", "info"];

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameFieldArgs {
    model: String,
    old: String,
    new: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddFieldArgs {
    model: String,
    field: String,
    position: Option<usize>,
    #[serde(default)]
    default: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveFieldArgs {
    model: String,
    field: String,
    #[serde(default)]
    strip_references: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateArgs {
    name: String,
    qfmt: String,
    afmt: String,
}

impl From<TemplateArgs> for TemplateSpec {
    fn from(args: TemplateArgs) -> Self {
        TemplateSpec::new(args.name, args.qfmt, args.afmt)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddModelArgs {
    name: String,
    fields: Vec<String>,
    #[serde(default)]
    templates: Vec<TemplateArgs>,
    css: Option<String>,
    #[serde(default)]
    cloze: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameModelArgs {
    model: String,
    new_name: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddTemplateArgs {
    model: String,
    name: String,
    qfmt: String,
    afmt: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrateNotesArgs {
    source: String,
    target: String,
    mapping: FieldMapping,
    #[serde(default)]
    template_map: BTreeMap<String, String>,
    #[serde(default)]
    fallback_to_first: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TagNotesArgs {
    model: Option<String>,
    field: String,
    pattern: String,
    tag: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveEmptyNotesArgs {
    model: Option<String>,
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DivideDecksArgs {
    source_deck: String,
    tag_prefix: String,
    tag_pattern: String,
    episodes_per_deck: u32,
    target_deck_prefix: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PopulateFieldsArgs {
    model: String,
    populator: String,
    #[serde(default)]
    config: PopulatorConfig,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
}

fn parse<T: DeserializeOwned>(op: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| AnkiError::Validation(format!("bad arguments for {}: {}", op, e)))
}

/// Build the write operation named `op` from its JSON arguments.
pub fn from_json(op: &str, args: Value) -> Result<Box<dyn Operation>> {
    let operation: Box<dyn Operation> = match op {
        "rename-field" => {
            let a: RenameFieldArgs = parse(op, args)?;
            Box::new(RenameField::new(a.model, a.old, a.new))
        }
        "add-field" => {
            let a: AddFieldArgs = parse(op, args)?;
            let mut add = AddField::new(a.model, a.field).with_default(a.default);
            add.position = a.position;
            Box::new(add)
        }
        "remove-field" => {
            let a: RemoveFieldArgs = parse(op, args)?;
            let mut remove = RemoveField::new(a.model, a.field);
            remove.strip_references = a.strip_references;
            Box::new(remove)
        }
        "add-model" => {
            let a: AddModelArgs = parse(op, args)?;
            let mut add = AddModel::new(a.name, a.fields);
            add.templates = a.templates.into_iter().map(TemplateSpec::from).collect();
            add.css = a.css;
            add.cloze = a.cloze;
            Box::new(add)
        }
        "rename-model" => {
            let a: RenameModelArgs = parse(op, args)?;
            Box::new(RenameModel::new(a.model, a.new_name))
        }
        "add-template" => {
            let a: AddTemplateArgs = parse(op, args)?;
            Box::new(AddTemplate::new(
                a.model,
                TemplateSpec::new(a.name, a.qfmt, a.afmt),
            ))
        }
        "migrate-notes" => {
            let a: MigrateNotesArgs = parse(op, args)?;
            let mut migrate = MigrateNotes::new(a.source, a.target, a.mapping);
            migrate.template_map = a.template_map;
            migrate.fallback_to_first = a.fallback_to_first;
            Box::new(migrate)
        }
        "tag-notes" => {
            let a: TagNotesArgs = parse(op, args)?;
            Box::new(TagNotes::new(a.model, a.field, a.pattern, a.tag))
        }
        "remove-empty-notes" => {
            let a: RemoveEmptyNotesArgs = parse(op, args)?;
            Box::new(RemoveEmptyNotes::new(a.model, a.fields))
        }
        "divide-decks-by-tags" => {
            let a: DivideDecksArgs = parse(op, args)?;
            let mut divide =
                DivideDecks::new(a.source_deck, a.tag_prefix, a.tag_pattern, a.episodes_per_deck);
            divide.target_prefix = a.target_deck_prefix;
            Box::new(divide)
        }
        "populate-fields" => {
            let a: PopulateFieldsArgs = parse(op, args)?;
            let populator = populators::create(&a.populator, &a.config)?;
            let mut settings =
                BatchSettings::for_populator(populator.as_ref(), Duration::from_secs(30));
            if let Some(n) = a.concurrency {
                settings.concurrency = n.clamp(1, 8);
            }
            if let Some(secs) = a.timeout_secs {
                settings.timeout = Duration::from_secs(secs.max(1));
            }
            Box::new(PopulateFields::new(a.model, populator).with_settings(settings))
        }
        other if READ_OPERATIONS.contains(&other) => {
            return Err(AnkiError::Validation(format!(
                "'{}' is a read operation and cannot run in a batch",
                other
            )))
        }
        other => {
            return Err(AnkiError::Validation(format!(
                "unknown operation '{}' (available: {})",
                other,
                OPERATION_NAMES.join(", ")
            )))
        }
    };
    Ok(operation)
}
