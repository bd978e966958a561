use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{optional_str, required_str, FieldUpdates, NoteInput, Populator, PopulatorConfig};
use crate::error::Result;

static INNERMOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(][^（）()]*[）)]").expect("bracket pattern"));

/// Remove round-bracketed spans, innermost first, until none remain.
pub(crate) fn remove_brackets(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = INNERMOST.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Strips parenthesised text such as readings or asides.
#[derive(Debug, Default)]
pub struct RemoveBrackets {
    source: String,
    target: String,
}

#[async_trait]
impl Populator for RemoveBrackets {
    fn name(&self) -> &'static str {
        "remove-brackets"
    }

    fn configure(&mut self, config: &PopulatorConfig) -> Result<()> {
        self.source = required_str(config, "source_field")?;
        self.target = optional_str(config, "target_field")?.unwrap_or_else(|| self.source.clone());
        Ok(())
    }

    fn source_fields(&self) -> Vec<String> {
        vec![self.source.clone()]
    }

    fn target_fields(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
        let original = note.field(&self.source)?;
        let cleaned = remove_brackets(original);
        let mut updates = FieldUpdates::new();
        if cleaned != original && note.field(&self.target)? != cleaned {
            updates.insert(self.target.clone(), cleaned);
        }
        Ok(updates)
    }
}
