//! Notes, cards, decks and graves.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use super::identity::Identified;
use super::notetype::ModelId;

pub type NoteId = i64;
pub type CardId = i64;
pub type DeckId = i64;

static STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<style.*?>.*?</style>|<script.*?>.*?</script>|<!--.*?-->")
        .expect("style pattern")
});
static IMG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]*src=["']?([^"'>\s]+)["']?[^>]*>"#).expect("img pattern")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("tag pattern"));

/// Strip HTML the way the sort field and checksum expect: markup removed,
/// image tags replaced by their file name, common entities decoded.
pub fn strip_html(text: &str) -> String {
    let out = STYLE_RE.replace_all(text, "");
    let out = IMG_RE.replace_all(&out, " $1 ");
    let out = TAG_RE.replace_all(&out, "");
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// First-field checksum used for duplicate detection.
pub fn field_checksum(first_field: &str) -> i64 {
    let digest = Sha1::digest(strip_html(first_field).as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as i64
}

/// Split a stored tag string into a deduplicated list, keeping first-seen order.
pub fn parse_tags(stored: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in stored.split_whitespace() {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Join tags in storage form: space separated with a leading and trailing space.
pub fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(" {} ", tags.join(" "))
    }
}

/// A note: positional field values for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub guid: String,
    pub model_id: ModelId,
    pub modified: i64,
    pub usn: i64,
    /// Tag set in first-seen order
    pub tags: Vec<String>,
    /// Values, one per field of the owning model
    pub fields: Vec<String>,
    pub sort_field: String,
    pub checksum: i64,
    pub flags: i64,
    pub data: String,
}

impl Note {
    /// Add a tag; returns false if it was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Recompute derived columns after a content change.
    pub fn refresh(&mut self, sortf: usize, now_secs: i64) {
        let sort_value = self
            .fields
            .get(sortf)
            .or_else(|| self.fields.first())
            .map(String::as_str)
            .unwrap_or("");
        self.sort_field = strip_html(sort_value);
        self.checksum = field_checksum(self.fields.first().map(String::as_str).unwrap_or(""));
        self.modified = now_secs;
        self.usn = -1;
    }

    /// Whether every value is blank once markup and whitespace are removed.
    pub fn is_blank(&self, ords: Option<&[usize]>) -> bool {
        match ords {
            Some(ords) => ords
                .iter()
                .all(|&i| self.fields.get(i).map_or(true, |v| strip_html(v).is_empty())),
            None => self.fields.iter().all(|v| strip_html(v).is_empty()),
        }
    }
}

/// A card. Scheduling state is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    /// Template ordinal (or cloze number - 1)
    pub ord: usize,
    pub modified: i64,
    pub usn: i64,
    pub card_type: i64,
    pub queue: i64,
    pub due: i64,
    pub interval: i64,
    pub factor: i64,
    pub reps: i64,
    pub lapses: i64,
    pub left: i64,
    pub original_due: i64,
    pub original_deck: i64,
    pub flags: i64,
    pub data: String,
}

/// A deck. Everything except id and name is passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub raw: Map<String, Value>,
}

impl Identified for Deck {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Kinds of deletion records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraveKind {
    Card,
    Note,
    Deck,
    Other(i64),
}

impl GraveKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => GraveKind::Card,
            1 => GraveKind::Note,
            2 => GraveKind::Deck,
            other => GraveKind::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            GraveKind::Card => 0,
            GraveKind::Note => 1,
            GraveKind::Deck => 2,
            GraveKind::Other(code) => code,
        }
    }
}

/// A deletion record for sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grave {
    pub usn: i64,
    pub oid: i64,
    pub kind: GraveKind,
}
