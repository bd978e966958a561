//! Dictionary-driven furigana in Anki's ` 漢字[かんじ]` notation.

use std::collections::HashMap;
use std::fs;

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{optional_str, required_str, FieldUpdates, NoteInput, Populator, PopulatorConfig};
use crate::error::{AnkiError, Result};

static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ?([^\s\[\]]+)\[[^\]\[]*\]").expect("annotation pattern"));

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' | '々' | '〆')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

/// Remove existing furigana annotations, keeping the base text.
pub fn strip_annotations(text: &str) -> String {
    ANNOTATION.replace_all(text, "$1").into_owned()
}

/// Split `word`/`reading` into base, reading, and the kana tail they share.
fn split_okurigana<'a>(word: &'a str, reading: &'a str) -> (&'a str, &'a str, &'a str) {
    let mut shared = 0;
    for (w, r) in word.chars().rev().zip(reading.chars().rev()) {
        if w != r || !is_kana(w) {
            break;
        }
        shared += w.len_utf8();
    }
    // Keep at least one reading character for the base.
    while shared > 0 && (shared >= reading.len() || shared >= word.len()) {
        let step = word[word.len() - shared..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(shared);
        shared -= step;
    }
    let base = &word[..word.len() - shared];
    let kana = &reading[..reading.len() - shared];
    (base, kana, &word[word.len() - shared..])
}

/// Annotate kanji runs in `text` using `dictionary` (word to reading).
///
/// At each kanji the longest dictionary word starting there wins. Text
/// without a matching entry passes through unchanged.
pub fn annotate(text: &str, dictionary: &HashMap<String, String>, max_word_chars: usize) -> String {
    let plain = strip_annotations(text);
    let chars: Vec<char> = plain.chars().collect();
    let mut out = String::with_capacity(plain.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        if !is_kanji(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let longest = max_word_chars.min(chars.len() - i);
        let found = (1..=longest).rev().find_map(|len| {
            let word: String = chars[i..i + len].iter().collect();
            dictionary.get(&word).map(|reading| (word, reading, len))
        });
        match found {
            Some((word, reading, len)) => {
                let (base, kana, tail) = split_okurigana(&word, reading);
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(&format!("{}[{}]{}", base, kana, tail));
                i += len;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out
}

/// Adds readings above kanji from a word list.
#[derive(Debug, Default)]
pub struct Furigana {
    source: String,
    target: String,
    dictionary: HashMap<String, String>,
    max_word_chars: usize,
}

impl Furigana {
    fn load_dictionary_file(&mut self, path: &str) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            AnkiError::Validation(format!("cannot read dictionary file '{}': {}", path, e))
        })?;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let (word, reading) = line.split_once('\t').ok_or_else(|| {
                AnkiError::Validation(format!(
                    "{}:{}: expected 'word<TAB>reading'",
                    path,
                    line_no + 1
                ))
            })?;
            self.insert(word.trim(), reading.trim());
        }
        Ok(())
    }

    fn insert(&mut self, word: &str, reading: &str) {
        if word.is_empty() || reading.is_empty() {
            return;
        }
        self.max_word_chars = self.max_word_chars.max(word.chars().count());
        self.dictionary.insert(word.to_string(), reading.to_string());
    }
}

#[async_trait]
impl Populator for Furigana {
    fn name(&self) -> &'static str {
        "furigana"
    }

    fn configure(&mut self, config: &PopulatorConfig) -> Result<()> {
        self.source = required_str(config, "source_field")?;
        self.target = required_str(config, "target_field")?;

        match config.get("readings") {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (word, reading) in map {
                    let reading = reading.as_str().ok_or_else(|| {
                        AnkiError::Validation(format!("reading for '{}' must be a string", word))
                    })?;
                    self.insert(word, reading);
                }
            }
            Some(_) => {
                return Err(AnkiError::Validation(
                    "populator option 'readings' must be an object".to_string(),
                ))
            }
        }
        if let Some(path) = optional_str(config, "dictionary_file")? {
            self.load_dictionary_file(&path)?;
        }
        if self.dictionary.is_empty() {
            return Err(AnkiError::Validation(
                "furigana needs 'readings' or a non-empty 'dictionary_file'".to_string(),
            ));
        }
        debug!("Furigana dictionary holds {} words", self.dictionary.len());
        Ok(())
    }

    fn source_fields(&self) -> Vec<String> {
        vec![self.source.clone()]
    }

    fn target_fields(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    async fn populate(&self, note: &NoteInput) -> Result<FieldUpdates> {
        let source = note.field(&self.source)?;
        let annotated = annotate(source, &self.dictionary, self.max_word_chars);
        let mut updates = FieldUpdates::new();
        if note.field(&self.target)? != annotated {
            updates.insert(self.target.clone(), annotated);
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dict(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(w, r)| (w.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn test_okurigana_is_split_off() {
        assert_eq!(split_okurigana("食べる", "たべる"), ("食", "た", "べる"));
        assert_eq!(split_okurigana("今日", "きょう"), ("今日", "きょう", ""));
    }

    #[test]
    fn test_annotate_longest_match() {
        let d = dict(&[("日本", "にほん"), ("日本語", "にほんご"), ("猫", "ねこ"), ("好き", "すき")]);
        assert_eq!(annotate("日本語が好き", &d, 3), "日本語[にほんご]が 好[す]き");
        assert_eq!(annotate("猫と犬", &d, 3), "猫[ねこ]と犬");
    }

    #[test]
    fn test_existing_annotations_are_replaced() {
        let d = dict(&[("猫", "ねこ")]);
        assert_eq!(strip_annotations("黒い 猫[ねこ]"), "黒い猫");
        assert_eq!(annotate(" 猫[びょう]", &d, 1), "猫[ねこ]");
    }

    #[test]
    fn test_annotation_pattern_strips_every_reading() {
        assert!(ANNOTATION.is_match("猫[ねこ]"));
        assert_eq!(strip_annotations(" 日本[にほん] 語[ご]を 話[はな]す"), "日本語を話す");
    }

    #[test]
    fn test_dictionary_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment\n猫\tねこ\n\n走る\tはしる").unwrap();
        let mut p = Furigana::default();
        p.configure(
            serde_json::json!({
                "source_field": "Front",
                "target_field": "Reading",
                "dictionary_file": file.path().to_str().unwrap(),
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(p.dictionary.len(), 2);
        assert_eq!(annotate("猫が走る", &p.dictionary, p.max_word_chars), "猫[ねこ]が 走[はし]る");
    }

    #[test]
    fn test_empty_dictionary_rejected() {
        let mut p = Furigana::default();
        let err = p
            .configure(
                serde_json::json!({"source_field": "A", "target_field": "B"})
                    .as_object()
                    .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, AnkiError::Validation(_)));
    }
}
