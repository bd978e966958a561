//! Path addressing for collection objects.
//!
//! Addresses look like filesystem paths:
//!
//! ```text
//! /models[/<model>[/fields[/<field>] | /templates[/<template>] | /css | /example]]
//! /notes[/<note-id> | /<model>]
//! /cards[/<card-id> | /<model>]
//! /decks[/<deck>]
//! ```
//!
//! Model and deck tokens are tried as numeric IDs first, then as exact names.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::error::{AnkiError, Result};
use crate::model::{Card, Collection, Deck, Field, Model, Note, Template};

/// A parsed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Models,
    Model(String),
    Fields(String),
    Field(String, String),
    Templates(String),
    Template(String, String),
    Css(String),
    Example(String),
    Notes(Option<String>),
    Cards(Option<String>),
    Decks(Option<String>),
}

impl Locator {
    /// Parse an address. A trailing `/` is ignored.
    pub fn parse(path: &str) -> Result<Self> {
        let body = path
            .strip_prefix('/')
            .ok_or_else(|| AnkiError::InvalidPath(format!("'{}' must start with '/'", path)))?;
        let body = body.strip_suffix('/').unwrap_or(body);
        let segments: Vec<&str> = body.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AnkiError::InvalidPath(format!("'{}' has an empty segment", path)));
        }

        let owned = |s: &str| s.to_string();
        let locator = match segments.as_slice() {
            ["models"] => Locator::Models,
            ["models", m] => Locator::Model(owned(m)),
            ["models", m, "fields"] => Locator::Fields(owned(m)),
            ["models", m, "fields", f] => Locator::Field(owned(m), owned(f)),
            ["models", m, "templates"] => Locator::Templates(owned(m)),
            ["models", m, "templates", t] => Locator::Template(owned(m), owned(t)),
            ["models", m, "css"] => Locator::Css(owned(m)),
            ["models", m, "example"] => Locator::Example(owned(m)),
            ["notes"] => Locator::Notes(None),
            ["notes", token] => Locator::Notes(Some(owned(token))),
            ["cards"] => Locator::Cards(None),
            ["cards", token] => Locator::Cards(Some(owned(token))),
            ["decks"] => Locator::Decks(None),
            ["decks", token] => Locator::Decks(Some(owned(token))),
            ["models", _, other, ..] => {
                return Err(AnkiError::InvalidPath(format!(
                    "unknown model member '{}' in {}",
                    other, path
                )))
            }
            [root, ..] if !["models", "notes", "cards", "decks"].contains(root) => {
                return Err(AnkiError::InvalidPath(format!(
                    "unknown root '{}' in {}",
                    root, path
                )))
            }
            _ => return Err(AnkiError::InvalidPath(format!("'{}' is too deep", path))),
        };
        Ok(locator)
    }
}

impl FromStr for Locator {
    type Err = AnkiError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Models => write!(f, "/models"),
            Locator::Model(m) => write!(f, "/models/{}", m),
            Locator::Fields(m) => write!(f, "/models/{}/fields", m),
            Locator::Field(m, x) => write!(f, "/models/{}/fields/{}", m, x),
            Locator::Templates(m) => write!(f, "/models/{}/templates", m),
            Locator::Template(m, x) => write!(f, "/models/{}/templates/{}", m, x),
            Locator::Css(m) => write!(f, "/models/{}/css", m),
            Locator::Example(m) => write!(f, "/models/{}/example", m),
            Locator::Notes(None) => write!(f, "/notes"),
            Locator::Notes(Some(t)) => write!(f, "/notes/{}", t),
            Locator::Cards(None) => write!(f, "/cards"),
            Locator::Cards(Some(t)) => write!(f, "/cards/{}", t),
            Locator::Decks(None) => write!(f, "/decks"),
            Locator::Decks(Some(t)) => write!(f, "/decks/{}", t),
        }
    }
}

/// What an address resolved to, borrowed from the collection.
#[derive(Debug)]
pub enum Resolved<'c> {
    Models(Vec<&'c Model>),
    Model(&'c Model),
    Fields(&'c Model),
    Field(&'c Model, &'c Field),
    Templates(&'c Model),
    Template(&'c Model, &'c Template),
    Css(&'c Model),
    Example(&'c Model, Option<&'c Note>),
    Notes(Vec<&'c Note>),
    Note(&'c Note),
    Cards(Vec<&'c Card>),
    Card(&'c Card),
    Decks(Vec<&'c Deck>),
    Deck(&'c Deck),
}

impl<'c> Resolved<'c> {
    /// Whether this is a set of objects rather than one.
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            Resolved::Models(_)
                | Resolved::Fields(_)
                | Resolved::Templates(_)
                | Resolved::Notes(_)
                | Resolved::Cards(_)
                | Resolved::Decks(_)
        )
    }

    /// Number of objects addressed.
    pub fn count(&self) -> usize {
        match self {
            Resolved::Models(v) => v.len(),
            Resolved::Fields(m) => m.fields.len(),
            Resolved::Templates(m) => m.templates.len(),
            Resolved::Notes(v) => v.len(),
            Resolved::Cards(v) => v.len(),
            Resolved::Decks(v) => v.len(),
            Resolved::Example(_, note) => usize::from(note.is_some()),
            _ => 1,
        }
    }

    /// JSON rendering for listings; sets are truncated to `limit` items.
    pub fn to_json(&self, collection: &Collection, limit: Option<usize>) -> Value {
        let cap = limit.filter(|&l| l > 0).unwrap_or(usize::MAX);
        match self {
            Resolved::Models(models) => json!({
                "models": models.iter().take(cap).map(|m| model_summary(m)).collect::<Vec<_>>()
            }),
            Resolved::Model(m) => model_detail(m),
            Resolved::Fields(m) => json!({
                "model": m.name,
                "fields": m.fields.iter().take(cap).map(field_json).collect::<Vec<_>>()
            }),
            Resolved::Field(m, field) => json!({ "model": m.name, "field": field_json(field) }),
            Resolved::Templates(m) => json!({
                "model": m.name,
                "templates": m.templates.iter().take(cap).map(template_json).collect::<Vec<_>>()
            }),
            Resolved::Template(m, t) => json!({ "model": m.name, "template": template_json(t) }),
            Resolved::Css(m) => json!({ "model": m.name, "css": m.css }),
            Resolved::Example(m, note) => json!({
                "model": m.name,
                "example": note.map(|n| note_json(collection, n)),
            }),
            Resolved::Notes(notes) => json!({
                "notes": notes.iter().take(cap).map(|n| note_json(collection, n)).collect::<Vec<_>>()
            }),
            Resolved::Note(n) => note_json(collection, n),
            Resolved::Cards(cards) => json!({
                "cards": cards.iter().take(cap).map(|c| card_json(c)).collect::<Vec<_>>()
            }),
            Resolved::Card(c) => card_json(c),
            Resolved::Decks(decks) => json!({
                "decks": decks.iter().take(cap).map(|d| deck_json(collection, d)).collect::<Vec<_>>()
            }),
            Resolved::Deck(d) => deck_json(collection, d),
        }
    }
}

fn model_summary(model: &Model) -> Value {
    json!({
        "id": model.id,
        "name": model.name,
        "type": model.kind.label(),
        "fields": model.fields.len(),
        "templates": model.templates.len(),
    })
}

fn model_detail(model: &Model) -> Value {
    json!({
        "id": model.id,
        "name": model.name,
        "type": model.kind.label(),
        "fields": model.field_names(),
        "templates": model.templates.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
        "sort_field": model.fields.get(model.sortf).map(|f| f.name.clone()),
    })
}

fn field_json(field: &Field) -> Value {
    json!({ "name": field.name, "ord": field.ord })
}

fn template_json(template: &Template) -> Value {
    json!({
        "name": template.name,
        "ord": template.ord,
        "qfmt": template.qfmt,
        "afmt": template.afmt,
    })
}

fn note_json(collection: &Collection, note: &Note) -> Value {
    let model = collection.models.get(note.model_id);
    let mut fields = Map::new();
    for (i, value) in note.fields.iter().enumerate() {
        let name = model
            .and_then(|m| m.fields.get(i))
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("#{}", i));
        fields.insert(name, Value::String(value.clone()));
    }
    json!({
        "id": note.id,
        "model": model.map(|m| m.name.clone()),
        "fields": fields,
        "tags": note.tags,
    })
}

fn card_json(card: &Card) -> Value {
    json!({
        "id": card.id,
        "note_id": card.note_id,
        "deck_id": card.deck_id,
        "ord": card.ord,
    })
}

fn deck_json(collection: &Collection, deck: &Deck) -> Value {
    json!({
        "id": deck.id,
        "name": deck.name,
        "cards": collection.cards.values().filter(|c| c.deck_id == deck.id).count(),
    })
}

fn parse_id(token: &str) -> Option<i64> {
    if token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

/// Re-anchor a lookup failure on the full address being resolved.
fn at(path: &Locator) -> impl Fn(AnkiError) -> AnkiError + '_ {
    move |err| match err {
        AnkiError::NotFound { segment, .. } => AnkiError::NotFound {
            segment,
            path: path.to_string(),
        },
        other => other,
    }
}

/// Resolve an address string against a collection.
pub fn resolve<'c>(collection: &'c Collection, path: &str) -> Result<Resolved<'c>> {
    let locator = Locator::parse(path)?;
    resolve_locator(collection, &locator)
}

/// Resolve a parsed address against a collection.
pub fn resolve_locator<'c>(collection: &'c Collection, locator: &Locator) -> Result<Resolved<'c>> {
    let model = |token: &str| collection.lookup_model(token).map_err(at(locator));
    let missing = |segment: &str| AnkiError::not_found(segment, locator.to_string());

    let resolved = match locator {
        Locator::Models => Resolved::Models(collection.models.iter().collect()),
        Locator::Model(m) => Resolved::Model(model(m)?),
        Locator::Fields(m) => Resolved::Fields(model(m)?),
        Locator::Field(m, name) => {
            let model = model(m)?;
            let field = model.field(name).ok_or_else(|| missing(name))?;
            Resolved::Field(model, field)
        }
        Locator::Templates(m) => Resolved::Templates(model(m)?),
        Locator::Template(m, name) => {
            let model = model(m)?;
            let template = model
                .templates
                .iter()
                .find(|t| &t.name == name)
                .ok_or_else(|| missing(name))?;
            Resolved::Template(model, template)
        }
        Locator::Css(m) => Resolved::Css(model(m)?),
        Locator::Example(m) => {
            let model = model(m)?;
            Resolved::Example(model, collection.notes_of(model.id).next())
        }
        Locator::Notes(None) => Resolved::Notes(collection.notes.values().collect()),
        Locator::Notes(Some(token)) => {
            match parse_id(token).and_then(|id| collection.notes.get(&id)) {
                Some(note) => Resolved::Note(note),
                None => Resolved::Notes(collection.notes_of(model(token)?.id).collect()),
            }
        }
        Locator::Cards(None) => Resolved::Cards(collection.cards.values().collect()),
        Locator::Cards(Some(token)) => {
            match parse_id(token).and_then(|id| collection.cards.get(&id)) {
                Some(card) => Resolved::Card(card),
                None => Resolved::Cards(collection.cards_of_model(model(token)?.id)),
            }
        }
        Locator::Decks(None) => Resolved::Decks(collection.decks.iter().collect()),
        Locator::Decks(Some(token)) => {
            Resolved::Deck(collection.lookup_deck(token).map_err(at(locator))?)
        }
    };
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection_fixture;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Locator::parse("/models").unwrap(), Locator::Models);
        assert_eq!(
            Locator::parse("/models/Basic/fields/Front/").unwrap(),
            Locator::Field("Basic".into(), "Front".into())
        );
        assert_eq!(
            Locator::parse("/models/Basic/templates/Card 1").unwrap(),
            Locator::Template("Basic".into(), "Card 1".into())
        );
        assert_eq!(
            Locator::parse("/notes/Basic").unwrap(),
            Locator::Notes(Some("Basic".into()))
        );
        assert_eq!(
            Locator::parse("/models/Basic/css").unwrap().to_string(),
            "/models/Basic/css"
        );
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        for bad in ["models", "/", "/widgets", "/models//fields", "/models/B/colour", "/notes/a/b"] {
            assert!(
                matches!(Locator::parse(bad), Err(AnkiError::InvalidPath(_))),
                "{} should be invalid",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_field() {
        let col = collection_fixture();
        match resolve(&col, "/models/Basic/fields/Front").unwrap() {
            Resolved::Field(model, field) => {
                assert_eq!(model.name, "Basic");
                assert_eq!(field.name, "Front");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_field_names_segment() {
        let col = collection_fixture();
        match resolve(&col, "/models/Basic/fields/Nonexistent") {
            Err(AnkiError::NotFound { segment, path }) => {
                assert_eq!(segment, "Nonexistent");
                assert_eq!(path, "/models/Basic/fields/Nonexistent");
            }
            other => panic!("unexpected {:?}", other),
        }
        match resolve(&col, "/models/Nope/fields") {
            Err(AnkiError::NotFound { segment, .. }) => assert_eq!(segment, "Nope"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_sets_in_natural_order() {
        let col = collection_fixture();
        assert_eq!(resolve(&col, "/models").unwrap().count(), 2);
        assert_eq!(resolve(&col, "/models/Basic/fields").unwrap().count(), 2);
        assert_eq!(resolve(&col, "/notes/Basic").unwrap().count(), 2);
        assert_eq!(resolve(&col, "/notes/Target").unwrap().count(), 0);
        assert_eq!(resolve(&col, "/cards/Basic").unwrap().count(), 2);

        match resolve(&col, "/notes").unwrap() {
            Resolved::Notes(notes) => {
                let ids: Vec<_> = notes.iter().map(|n| n.id).collect();
                assert_eq!(ids, vec![10, 11]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_numeric_tokens_are_ids_first() {
        let col = collection_fixture();
        assert!(matches!(resolve(&col, "/notes/10").unwrap(), Resolved::Note(n) if n.id == 10));
        assert!(matches!(resolve(&col, "/cards/1001").unwrap(), Resolved::Card(c) if c.note_id == 11));
        assert!(matches!(resolve(&col, "/models/200").unwrap(), Resolved::Model(m) if m.name == "Target"));
    }

    #[test]
    fn test_note_json_names_fields() {
        let col = collection_fixture();
        let value = resolve(&col, "/notes/Basic").unwrap().to_json(&col, Some(1));
        let notes = value["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["fields"]["Front"], "猫好き");
        assert_eq!(notes[0]["model"], "Basic");
    }
}
