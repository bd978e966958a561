//! JSON column shapes for models, fields, templates and decks.
//!
//! Parsing keeps the source object on the entity; writing starts from that
//! object and overwrites only the keys the model promotes, so keys this crate
//! does not know about survive untouched.

use serde_json::{json, Map, Value};

use crate::error::{AnkiError, Result};
use crate::model::{Deck, Field, Model, ModelKind, SchemaGeneration, Template};

/// Field keys that only exist in generation 21 collections.
pub(crate) const FIELD_ANKI21_KEYS: &[&str] = &[
    "description",
    "plainText",
    "collapsed",
    "excludeFromSearch",
    "preventDeletion",
    "tag",
    "id",
];

/// Template keys that only exist in generation 21 collections.
pub(crate) const TEMPLATE_ANKI21_KEYS: &[&str] = &["bfont", "bsize", "id"];

// --- Reading ---

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn get_i64(obj: &Map<String, Value>, key: &str, default: i64) -> i64 {
    obj.get(key).and_then(as_i64).unwrap_or(default)
}

fn get_bool(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(as_bool).unwrap_or(false)
}

fn get_str(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn get_opt_i64(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    obj.get(key).and_then(as_i64)
}

fn get_ord(obj: &Map<String, Value>, fallback: usize) -> usize {
    obj.get("ord")
        .and_then(as_i64)
        .and_then(|o| usize::try_from(o).ok())
        .unwrap_or(fallback)
}

fn expect_object(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AnkiError::Schema(format!(
            "{} must be a JSON object, found {}",
            what,
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a JSON column into an object. Empty text reads as an empty object.
pub(crate) fn parse_object(text: &str, column: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AnkiError::Schema(format!("col.{} is not valid JSON: {}", column, e)))?;
    expect_object(value, &format!("col.{}", column))
}

fn parse_field(obj: Map<String, Value>, position: usize) -> Field {
    Field {
        name: get_str(&obj, "name", ""),
        ord: get_ord(&obj, position),
        sticky: get_bool(&obj, "sticky"),
        rtl: get_bool(&obj, "rtl"),
        font: get_str(&obj, "font", "Arial"),
        size: get_i64(&obj, "size", 20),
        media: obj
            .get("media")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        description: get_str(&obj, "description", ""),
        plain_text: get_bool(&obj, "plainText"),
        collapsed: get_bool(&obj, "collapsed"),
        exclude_from_search: get_bool(&obj, "excludeFromSearch"),
        prevent_deletion: get_bool(&obj, "preventDeletion"),
        tag: obj.get("tag").cloned().unwrap_or(Value::Null),
        id: get_opt_i64(&obj, "id"),
        raw: obj,
    }
}

fn parse_template(obj: Map<String, Value>, position: usize) -> Template {
    Template {
        name: get_str(&obj, "name", ""),
        ord: get_ord(&obj, position),
        qfmt: get_str(&obj, "qfmt", ""),
        afmt: get_str(&obj, "afmt", ""),
        did: get_opt_i64(&obj, "did"),
        bqfmt: get_str(&obj, "bqfmt", ""),
        bafmt: get_str(&obj, "bafmt", ""),
        bfont: get_str(&obj, "bfont", ""),
        bsize: get_i64(&obj, "bsize", 0),
        id: get_opt_i64(&obj, "id"),
        raw: obj,
    }
}

fn parse_list<T>(
    obj: &Map<String, Value>,
    key: &str,
    owner: &str,
    parse: impl Fn(Map<String, Value>, usize) -> T,
) -> Result<Vec<T>> {
    let items = match obj.get(key) {
        Some(Value::Array(items)) => items,
        None => return Ok(Vec::new()),
        Some(other) => {
            return Err(AnkiError::Schema(format!(
                "model '{}' {} must be an array, found {}",
                owner,
                key,
                type_name(other)
            )))
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let map = expect_object(item.clone(), &format!("model '{}' {}[{}]", owner, key, i))?;
            Ok(parse(map, i))
        })
        .collect()
}

/// Build a model from its JSON object. `key` is the object key it was stored under.
pub(crate) fn parse_model(
    key: &str,
    value: Value,
    generation: SchemaGeneration,
) -> Result<Model> {
    let obj = expect_object(value, &format!("model {}", key))?;
    let id = get_opt_i64(&obj, "id")
        .or_else(|| key.parse().ok())
        .ok_or_else(|| AnkiError::Schema(format!("model {} has no numeric id", key)))?;
    let name = get_str(&obj, "name", "");

    let mut fields = parse_list(&obj, "flds", &name, parse_field)?;
    let mut templates = parse_list(&obj, "tmpls", &name, parse_template)?;
    if generation == SchemaGeneration::Anki21 {
        fields.sort_by_key(|f| f.ord);
        templates.sort_by_key(|t| t.ord);
    }

    Ok(Model {
        id,
        kind: ModelKind::from_code(get_i64(&obj, "type", 0)),
        fields,
        templates,
        css: get_str(&obj, "css", ""),
        sortf: get_opt_i64(&obj, "sortf")
            .and_then(|s| usize::try_from(s).ok())
            .unwrap_or(0),
        did: get_opt_i64(&obj, "did"),
        modified: get_i64(&obj, "mod", 0),
        usn: get_i64(&obj, "usn", 0),
        req: obj.get("req").cloned().unwrap_or(Value::Null),
        name,
        raw: obj,
    })
}

pub(crate) fn parse_deck(key: &str, value: Value) -> Result<Deck> {
    let obj = expect_object(value, &format!("deck {}", key))?;
    let id = get_opt_i64(&obj, "id")
        .or_else(|| key.parse().ok())
        .ok_or_else(|| AnkiError::Schema(format!("deck {} has no numeric id", key)))?;
    Ok(Deck {
        id,
        name: get_str(&obj, "name", ""),
        raw: obj,
    })
}

/// Whether the models column carries any generation 21 attribute.
pub(crate) fn has_anki21_keys(models: &Map<String, Value>) -> bool {
    models.values().filter_map(Value::as_object).any(|model| {
        let any_in = |list: &str, keys: &[&str]| {
            model
                .get(list)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .any(|item| keys.iter().any(|k| item.contains_key(*k)))
                })
                .unwrap_or(false)
        };
        any_in("flds", FIELD_ANKI21_KEYS) || any_in("tmpls", TEMPLATE_ANKI21_KEYS)
    })
}

// --- Writing ---

/// Value equality that tolerates the number/string/bool drift found in old collections.
fn same_value(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            n.as_i64().map(|i| i.to_string()) == Some(s.clone())
        }
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            n.as_i64() == Some(*flag as i64)
        }
        _ => false,
    }
}

/// Overwrite a key unless the stored value already means the same thing.
fn set(obj: &mut Map<String, Value>, key: &str, value: Value) {
    match obj.get(key) {
        Some(existing) if same_value(existing, &value) => {}
        _ => {
            obj.insert(key.to_string(), value);
        }
    }
}

/// Key emission policy for attributes not every source object carries.
struct Emitter<'a> {
    raw: &'a Map<String, Value>,
    generation: SchemaGeneration,
}

impl Emitter<'_> {
    fn is_new(&self) -> bool {
        self.raw.is_empty()
    }

    fn put(&self, out: &mut Map<String, Value>, key: &str, value: Value, default: Value, anki21_only: bool) {
        let loaded = self.raw.contains_key(key);
        let emit = if anki21_only && self.generation == SchemaGeneration::Anki2 {
            loaded
        } else {
            loaded || self.is_new() || !same_value(&value, &default)
        };
        if emit {
            set(out, key, value);
        }
    }
}

fn opt_i64(value: Option<i64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn field_json(field: &Field, generation: SchemaGeneration) -> Value {
    let mut out = field.raw.clone();
    let emit = Emitter {
        raw: &field.raw,
        generation,
    };
    set(&mut out, "name", json!(field.name));
    set(&mut out, "ord", json!(field.ord));
    emit.put(&mut out, "sticky", json!(field.sticky), json!(false), false);
    emit.put(&mut out, "rtl", json!(field.rtl), json!(false), false);
    emit.put(&mut out, "font", json!(field.font), json!("Arial"), false);
    emit.put(&mut out, "size", json!(field.size), json!(20), false);
    emit.put(&mut out, "media", Value::Array(field.media.clone()), json!([]), false);
    emit.put(&mut out, "description", json!(field.description), json!(""), true);
    emit.put(&mut out, "plainText", json!(field.plain_text), json!(false), true);
    emit.put(&mut out, "collapsed", json!(field.collapsed), json!(false), true);
    emit.put(&mut out, "excludeFromSearch", json!(field.exclude_from_search), json!(false), true);
    emit.put(&mut out, "preventDeletion", json!(field.prevent_deletion), json!(false), true);
    emit.put(&mut out, "tag", field.tag.clone(), Value::Null, true);
    emit.put(&mut out, "id", opt_i64(field.id), Value::Null, true);
    Value::Object(out)
}

fn template_json(template: &Template, generation: SchemaGeneration) -> Value {
    let mut out = template.raw.clone();
    let emit = Emitter {
        raw: &template.raw,
        generation,
    };
    set(&mut out, "name", json!(template.name));
    set(&mut out, "ord", json!(template.ord));
    set(&mut out, "qfmt", json!(template.qfmt));
    set(&mut out, "afmt", json!(template.afmt));
    emit.put(&mut out, "did", opt_i64(template.did), Value::Null, false);
    emit.put(&mut out, "bqfmt", json!(template.bqfmt), json!(""), false);
    emit.put(&mut out, "bafmt", json!(template.bafmt), json!(""), false);
    emit.put(&mut out, "bfont", json!(template.bfont), json!(""), true);
    emit.put(&mut out, "bsize", json!(template.bsize), json!(0), true);
    emit.put(&mut out, "id", opt_i64(template.id), Value::Null, true);
    Value::Object(out)
}

pub(crate) fn model_json(model: &Model, generation: SchemaGeneration) -> Value {
    let mut out = model.raw.clone();
    let emit = Emitter {
        raw: &model.raw,
        generation,
    };
    set(&mut out, "id", json!(model.id));
    set(&mut out, "name", json!(model.name));
    set(&mut out, "type", json!(model.kind.code()));
    set(&mut out, "mod", json!(model.modified));
    set(&mut out, "usn", json!(model.usn));
    set(&mut out, "sortf", json!(model.sortf));
    emit.put(&mut out, "did", opt_i64(model.did), Value::Null, false);
    out.insert(
        "flds".to_string(),
        Value::Array(model.fields.iter().map(|f| field_json(f, generation)).collect()),
    );
    out.insert(
        "tmpls".to_string(),
        Value::Array(
            model
                .templates
                .iter()
                .map(|t| template_json(t, generation))
                .collect(),
        ),
    );
    set(&mut out, "css", json!(model.css));
    emit.put(&mut out, "req", model.req.clone(), Value::Null, false);
    Value::Object(out)
}

pub(crate) fn deck_json(deck: &Deck) -> Value {
    let mut out = deck.raw.clone();
    set(&mut out, "id", json!(deck.id));
    set(&mut out, "name", json!(deck.name));
    Value::Object(out)
}

/// Serialize a JSON column, reusing the baseline text when nothing changed.
pub(crate) fn column_text(value: &Map<String, Value>, baseline: Option<&str>) -> Result<String> {
    if let Some(text) = baseline {
        if let Ok(Value::Object(previous)) = serde_json::from_str::<Value>(text) {
            if &previous == value {
                return Ok(text.to_string());
            }
        }
        if text.trim().is_empty() && value.is_empty() {
            return Ok(text.to_string());
        }
    }
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anki2_model() -> Value {
        json!({
            "id": "1342697561419",
            "name": "Basic",
            "type": 0,
            "mod": 1342697561,
            "usn": -1,
            "sortf": 0,
            "did": 1,
            "flds": [
                {"name": "Front", "ord": 0, "sticky": false, "rtl": false, "font": "Arial", "size": 20, "media": []},
                {"name": "Back", "ord": 1, "sticky": false, "rtl": false, "font": "Arial", "size": 20, "media": []}
            ],
            "tmpls": [
                {"name": "Card 1", "ord": 0, "qfmt": "{{Front}}", "afmt": "{{Back}}", "did": null, "bqfmt": "", "bafmt": ""}
            ],
            "css": ".card {}",
            "req": [[0, "all", [0]]],
            "latexPre": "x",
            "vers": []
        })
    }

    #[test]
    fn test_unmodified_model_writes_equal_value() {
        let source = anki2_model();
        let model = parse_model("1342697561419", source.clone(), SchemaGeneration::Anki2).unwrap();
        assert_eq!(model.id, 1342697561419);
        assert_eq!(model_json(&model, SchemaGeneration::Anki2), source);
    }

    #[test]
    fn test_anki2_output_drops_new_anki21_keys() {
        let mut model = parse_model("1", anki2_model(), SchemaGeneration::Anki2).unwrap();
        model.fields[0].prevent_deletion = true;
        model.fields.push(Field::new("Extra", 2));

        let out = model_json(&model, SchemaGeneration::Anki2);
        let fields = out["flds"].as_array().unwrap();
        assert!(fields[0].get("preventDeletion").is_none());
        assert!(fields[2].get("id").is_none());
        assert_eq!(fields[2]["name"], "Extra");
        assert_eq!(fields[2]["size"], 20);
    }

    #[test]
    fn test_anki21_output_fills_new_entities() {
        let mut model = parse_model("1", anki2_model(), SchemaGeneration::Anki21).unwrap();
        model.fields.push(Field::new("Extra", 2));
        model.fields[0].prevent_deletion = true;

        let out = model_json(&model, SchemaGeneration::Anki21);
        let fields = out["flds"].as_array().unwrap();
        assert_eq!(fields[0]["preventDeletion"], true);
        assert!(fields[0].get("plainText").is_none());
        assert_eq!(fields[2]["plainText"], false);
        assert!(fields[2]["id"].is_i64());
    }

    #[test]
    fn test_anki21_sorts_by_ord() {
        let mut source = anki2_model();
        source["flds"].as_array_mut().unwrap().reverse();
        let model = parse_model("1", source, SchemaGeneration::Anki21).unwrap();
        assert_eq!(model.field_names(), vec!["Front", "Back"]);
    }

    #[test]
    fn test_anki21_keys_decide_generation() {
        let mut models = Map::new();
        models.insert("1".into(), anki2_model());
        assert!(!has_anki21_keys(&models));

        models["1"]["tmpls"][0]["bfont"] = json!("");
        assert!(has_anki21_keys(&models));
    }

    #[test]
    fn test_column_text_reuses_baseline() {
        let text = "{\"b\": 1,  \"a\": [1, 2]}";
        let value = parse_object(text, "conf").unwrap();
        assert_eq!(column_text(&value, Some(text)).unwrap(), text);

        let mut changed = value.clone();
        changed.insert("c".into(), json!(true));
        assert_eq!(
            column_text(&changed, Some(text)).unwrap(),
            r#"{"b":1,"a":[1,2],"c":true}"#
        );
    }

    #[test]
    fn test_malformed_column_is_schema_error() {
        assert!(matches!(parse_object("[1]", "models"), Err(AnkiError::Schema(_))));
        assert!(matches!(parse_object("{", "models"), Err(AnkiError::Schema(_))));
    }
}
