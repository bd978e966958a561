//! Deck-level operations.

use std::collections::BTreeMap;

use log::debug;
use regex::Regex;
use serde_json::json;

use super::{ChangeKind, Operation, OperationReport};
use crate::error::{AnkiError, Result};
use crate::model::{CardId, Collection, DeckId};

/// Split a deck into numbered sub-ranges by an episode number found in tags.
///
/// For each card in the source deck, every note tag starting with
/// `{tag_prefix}_` is matched against `tag_pattern`; the first capture group
/// is the episode number. The lowest episode decides the target deck
/// `"{target prefix} {start}-{end}"`, with ranges `episodes_per_deck` wide
/// starting at 1. Cards without a matching tag stay where they are.
#[derive(Debug, Clone)]
pub struct DivideDecks {
    pub source_deck: String,
    pub tag_prefix: String,
    pub tag_pattern: String,
    pub episodes_per_deck: u32,
    /// Defaults to the source deck's name
    pub target_prefix: Option<String>,
}

impl DivideDecks {
    pub fn new(
        source_deck: impl Into<String>,
        tag_prefix: impl Into<String>,
        tag_pattern: impl Into<String>,
        episodes_per_deck: u32,
    ) -> Self {
        Self {
            source_deck: source_deck.into(),
            tag_prefix: tag_prefix.into(),
            tag_pattern: tag_pattern.into(),
            episodes_per_deck,
            target_prefix: None,
        }
    }

    fn compile(&self) -> Result<Regex> {
        let pattern = Regex::new(&self.tag_pattern).map_err(|e| {
            AnkiError::Validation(format!("invalid pattern '{}': {}", self.tag_pattern, e))
        })?;
        if pattern.captures_len() < 2 {
            return Err(AnkiError::Validation(format!(
                "pattern '{}' needs a capture group for the episode number",
                self.tag_pattern
            )));
        }
        Ok(pattern)
    }

    /// Lowest episode number among the tags carrying the prefix.
    fn episode(&self, pattern: &Regex, tags: &[String]) -> Option<u64> {
        let prefix = format!("{}_", self.tag_prefix);
        tags.iter()
            .filter(|tag| tag.starts_with(&prefix))
            .filter_map(|tag| pattern.captures(tag))
            .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok()))
            .min()
    }

    fn deck_name(&self, prefix: &str, episode: u64) -> String {
        let width = u64::from(self.episodes_per_deck);
        let index = episode.saturating_sub(1) / width;
        format!("{} {}-{}", prefix, index * width + 1, (index + 1) * width)
    }
}

impl Operation for DivideDecks {
    fn name(&self) -> &'static str {
        "divide-decks-by-tags"
    }

    fn validate(&self, collection: &Collection) -> Result<()> {
        collection.lookup_deck(&self.source_deck)?;
        if self.tag_prefix.is_empty() {
            return Err(AnkiError::Validation("tag prefix cannot be empty".to_string()));
        }
        if self.episodes_per_deck == 0 {
            return Err(AnkiError::Validation(
                "episodes per deck must be positive".to_string(),
            ));
        }
        self.compile().map(|_| ())
    }

    fn execute(&self, collection: &mut Collection) -> Result<OperationReport> {
        let pattern = self.compile()?;
        let source = collection.lookup_deck(&self.source_deck)?;
        let source_id = source.id;
        let prefix = self
            .target_prefix
            .clone()
            .unwrap_or_else(|| source.name.clone());

        let mut targets: BTreeMap<String, Vec<CardId>> = BTreeMap::new();
        let mut skipped = 0usize;
        for card in collection.cards.values().filter(|c| c.deck_id == source_id) {
            let episode = collection
                .notes
                .get(&card.note_id)
                .and_then(|note| self.episode(&pattern, &note.tags));
            match episode {
                Some(episode) => targets
                    .entry(self.deck_name(&prefix, episode))
                    .or_default()
                    .push(card.id),
                None => skipped += 1,
            }
        }

        let mut report = OperationReport::new(self.name());
        let mut moved = 0usize;
        for (name, card_ids) in &targets {
            let existing: Option<DeckId> = collection.decks.by_name(name).first().map(|d| d.id);
            let deck_id = match existing {
                Some(id) => id,
                None => {
                    let id = collection.add_deck(name)?;
                    report.record(ChangeKind::Added, format!("/decks/{}", name));
                    id
                }
            };
            if deck_id == source_id {
                continue;
            }
            for card_id in card_ids {
                collection.move_card(*card_id, deck_id)?;
                report.record(ChangeKind::Modified, format!("/cards/{}", card_id));
                moved += 1;
            }
            debug!("Moved {} cards into {}", card_ids.len(), name);
        }

        Ok(report
            .with_message(format!(
                "moved {} card(s) to {} deck(s), skipped {} card(s)",
                moved,
                targets.len(),
                skipped
            ))
            .with_data(json!({
                "moved": moved,
                "decks": targets.keys().collect::<Vec<_>>(),
                "skipped": skipped,
            })))
    }
}
