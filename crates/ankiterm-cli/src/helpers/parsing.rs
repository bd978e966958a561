//! Parsing helpers for flag values and input files.

use std::collections::BTreeMap;
use std::path::Path;

use ankiterm_core::ops::TemplateSpec;
use ankiterm_core::populators::PopulatorConfig;

use crate::errors::CliError;

/// Parse repeated `SRC=DST` flag values into a map.
pub fn parse_pairs(values: &[String], flag: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut pairs = BTreeMap::new();
    for value in values {
        let (src, dst) = value
            .split_once('=')
            .map(|(s, d)| (s.trim(), d.trim()))
            .filter(|(s, d)| !s.is_empty() && !d.is_empty())
            .ok_or_else(|| {
                CliError::invalid_input(format!(
                    "Invalid {} value '{}' (expected SRC=DST)",
                    flag, value
                ))
            })?;
        if pairs.insert(src.to_string(), dst.to_string()).is_some() {
            return Err(CliError::invalid_input(format!(
                "{} names '{}' more than once",
                flag, src
            ))
            .into());
        }
    }
    Ok(pairs)
}

/// Parse `NAME:QFMT:AFMT`. Colons inside `{{...}}` belong to the format.
pub fn parse_template(value: &str) -> anyhow::Result<TemplateSpec> {
    let parts = split_outside_braces(value, ':');
    match parts.as_slice() {
        [name, qfmt, afmt] if !name.trim().is_empty() => {
            Ok(TemplateSpec::new(name.trim(), *qfmt, *afmt))
        }
        _ => Err(CliError::invalid_input(format!(
            "Invalid --template value '{}' (expected NAME:QFMT:AFMT)",
            value
        ))
        .into()),
    }
}

fn split_outside_braces(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = value.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                depth += 1;
            }
            '}' if depth > 0 && matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                depth -= 1;
            }
            c if c == separator && depth == 0 => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Read a JSON object of populator options.
pub fn read_populator_config(path: &Path) -> anyhow::Result<PopulatorConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CliError::invalid_input(format!(
            "Failed to read populator config {}: {}",
            path.display(),
            e
        ))
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
        CliError::invalid_input(format!("Invalid JSON in {}: {}", path.display(), e))
    })?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(CliError::invalid_input(format!(
            "{} must contain a JSON object",
            path.display()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let values = vec!["X=P".to_string(), " Z = Q ".to_string()];
        let pairs = parse_pairs(&values, "--map").unwrap();
        assert_eq!(pairs.get("X").map(String::as_str), Some("P"));
        assert_eq!(pairs.get("Z").map(String::as_str), Some("Q"));
    }

    #[test]
    fn test_parse_pairs_rejects_malformed() {
        assert!(parse_pairs(&["X".to_string()], "--map").is_err());
        assert!(parse_pairs(&["=P".to_string()], "--map").is_err());
        assert!(parse_pairs(&["X=P".to_string(), "X=Q".to_string()], "--map").is_err());
    }

    #[test]
    fn test_parse_template() {
        let spec = parse_template("Card 1:{{Front}}:{{FrontSide}}<hr>{{Back}}").unwrap();
        assert_eq!(spec.name, "Card 1");
        assert_eq!(spec.qfmt, "{{Front}}");
        assert_eq!(spec.afmt, "{{FrontSide}}<hr>{{Back}}");
    }

    #[test]
    fn test_parse_template_keeps_colons_in_braces() {
        let spec = parse_template("Cloze:{{cloze:Text}}:{{cloze:Text}}<br>{{Extra}}").unwrap();
        assert_eq!(spec.qfmt, "{{cloze:Text}}");
        assert_eq!(spec.afmt, "{{cloze:Text}}<br>{{Extra}}");
    }

    #[test]
    fn test_parse_template_rejects_missing_parts() {
        assert!(parse_template("Card 1:{{Front}}").is_err());
        assert!(parse_template(":{{Front}}:{{Back}}").is_err());
    }

    #[test]
    fn test_read_populator_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.json");
        std::fs::write(&path, r#"{"source_field": "Front", "target_field": "Back"}"#).unwrap();
        let config = read_populator_config(&path).unwrap();
        assert_eq!(config["source_field"], "Front");

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(read_populator_config(&path).is_err());
    }
}
