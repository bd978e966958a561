//! In-memory object model of a collection.
//!
//! The model is the generation 21 superset shape. Everything generation
//! specific lives in the schema adapter; code here never sees field
//! separators or JSON column text.

mod collection;
mod identity;
mod note;
mod notetype;

pub use collection::{Collection, CollectionMeta, FieldMapping, SchemaGeneration};
pub use identity::{Identified, IdentityMap};
pub use note::{
    field_checksum, join_tags, parse_tags, strip_html, Card, CardId, Deck, DeckId, Grave,
    GraveKind, Note, NoteId,
};
pub use notetype::{
    rename_field_references, strip_field_references, Field, Model, ModelId, ModelKind, Template,
};

#[cfg(test)]
pub(crate) use collection::tests::{card as card_fixture, note as note_fixture, sample as collection_fixture};

use chrono::Utc;
use uuid::Uuid;

/// A random positive 63-bit identifier for new fields and templates.
pub(crate) fn random_id() -> i64 {
    (Uuid::new_v4().as_u64_pair().0 >> 1) as i64
}

/// Current time in whole seconds.
pub(crate) fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
