use async_trait::async_trait;

use super::{required_str, FieldUpdates, NoteInput, Populator, PopulatorConfig};
use crate::error::Result;

/// Copies one field's value into another.
#[derive(Debug, Default)]
pub struct CopyField {
    source: String,
    target: String,
}

#[async_trait]
impl Populator for CopyField {
    fn name(&self) -> &'static str {
        "copy-field"
    }

    fn configure(&mut self, config: &PopulatorConfig) -> Result<()> {
        self.source = required_str(config, "source_field")?;
        self.target = required_str(config, "target_field")?;
        Ok(())
    }

    fn source_fields(&self) -> Vec<String> {
        vec![self.source.clone()]
    }

    fn target_fields(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
        let value = note.field(&self.source)?;
        let mut updates = FieldUpdates::new();
        if note.field(&self.target)? != value {
            updates.insert(self.target.clone(), value.to_string());
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(front: &str, back: &str) -> NoteInput {
        NoteInput {
            note_id: 1,
            fields: [("Front", front), ("Back", back)]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            tags: Vec::new(),
        }
    }

    fn populator() -> CopyField {
        let mut p = CopyField::default();
        p.configure(
            json!({"source_field": "Front", "target_field": "Back"})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        p
    }

    #[tokio::test]
    async fn test_copies_value() {
        let updates = populator().populate(&input("猫", "")).await.unwrap();
        assert_eq!(updates.get("Back").map(String::as_str), Some("猫"));
    }

    #[tokio::test]
    async fn test_identical_value_is_no_update() {
        let updates = populator().populate(&input("猫", "猫")).await.unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_missing_option() {
        let mut p = CopyField::default();
        assert!(p
            .configure(json!({"source_field": "Front"}).as_object().unwrap())
            .is_err());
    }
}
