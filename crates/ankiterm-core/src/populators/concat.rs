use async_trait::async_trait;

use super::{
    optional_str, required_list, required_str, FieldUpdates, NoteInput, Populator,
    PopulatorConfig,
};
use crate::error::{AnkiError, Result};

/// Joins several fields into one, skipping empty values.
#[derive(Debug)]
pub struct ConcatFields {
    sources: Vec<String>,
    target: String,
    separator: String,
}

impl Default for ConcatFields {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target: String::new(),
            separator: " ".to_string(),
        }
    }
}

#[async_trait]
impl Populator for ConcatFields {
    fn name(&self) -> &'static str {
        "concat-fields"
    }

    fn configure(&mut self, config: &PopulatorConfig) -> Result<()> {
        self.sources = required_list(config, "source_fields")?;
        if self.sources.is_empty() {
            return Err(AnkiError::Validation(
                "source_fields must name at least one field".to_string(),
            ));
        }
        self.target = required_str(config, "target_field")?;
        if let Some(separator) = optional_str(config, "separator")? {
            self.separator = separator;
        }
        Ok(())
    }

    fn source_fields(&self) -> Vec<String> {
        self.sources.clone()
    }

    fn target_fields(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
        let mut parts = Vec::with_capacity(self.sources.len());
        for name in &self.sources {
            let value = note.field(name)?;
            if !value.trim().is_empty() {
                parts.push(value);
            }
        }
        let joined = parts.join(&self.separator);

        let mut updates = FieldUpdates::new();
        if note.field(&self.target)? != joined {
            updates.insert(self.target.clone(), joined);
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_joins_non_empty_values() {
        let mut p = ConcatFields::default();
        p.configure(
            json!({"source_fields": ["A", "B", "C"], "target_field": "Out", "separator": " / "})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        let note = NoteInput {
            note_id: 3,
            fields: [("A", "one"), ("B", " "), ("C", "three"), ("Out", "")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: Vec::new(),
        };

        let updates = p.populate(&note).await.unwrap();
        assert_eq!(updates["Out"], "one / three");
    }

    #[test]
    fn test_default_separator_is_space() {
        let mut p = ConcatFields::default();
        p.configure(
            json!({"source_fields": ["A"], "target_field": "Out"})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(p.separator, " ");
    }
}
