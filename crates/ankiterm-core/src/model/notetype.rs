//! Note types: models with their fields and templates.

use regex::{Captures, Regex};
use serde_json::{json, Map, Value};

use super::identity::Identified;
use super::random_id;

pub type ModelId = i64;

const DEFAULT_CSS: &str = ".card {\n font-family: arial;\n font-size: 20px;\n text-align: center;\n color: black;\n background-color: white;\n}\n";

const DEFAULT_LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";

const DEFAULT_LATEX_POST: &str = "\\end{document}";

/// Whether a model generates one card per template or one per cloze number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Standard,
    Cloze,
}

impl ModelKind {
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            ModelKind::Cloze
        } else {
            ModelKind::Standard
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ModelKind::Standard => 0,
            ModelKind::Cloze => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Standard => "Standard",
            ModelKind::Cloze => "Cloze",
        }
    }
}

/// A field definition. Values live on the notes, positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ord: usize,
    pub sticky: bool,
    pub rtl: bool,
    pub font: String,
    pub size: i64,
    pub media: Vec<Value>,
    pub description: String,
    pub plain_text: bool,
    pub collapsed: bool,
    pub exclude_from_search: bool,
    pub prevent_deletion: bool,
    pub tag: Value,
    pub id: Option<i64>,
    /// JSON object this field was loaded from; empty for new fields.
    pub raw: Map<String, Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, ord: usize) -> Self {
        Self {
            name: name.into(),
            ord,
            sticky: false,
            rtl: false,
            font: "Arial".to_string(),
            size: 20,
            media: Vec::new(),
            description: String::new(),
            plain_text: false,
            collapsed: false,
            exclude_from_search: false,
            prevent_deletion: false,
            tag: Value::Null,
            id: Some(random_id()),
            raw: Map::new(),
        }
    }
}

/// A card template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub ord: usize,
    pub qfmt: String,
    pub afmt: String,
    pub did: Option<i64>,
    pub bqfmt: String,
    pub bafmt: String,
    pub bfont: String,
    pub bsize: i64,
    pub id: Option<i64>,
    /// JSON object this template was loaded from; empty for new templates.
    pub raw: Map<String, Value>,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        ord: usize,
        qfmt: impl Into<String>,
        afmt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ord,
            qfmt: qfmt.into(),
            afmt: afmt.into(),
            did: None,
            bqfmt: String::new(),
            bafmt: String::new(),
            bfont: String::new(),
            bsize: 0,
            id: Some(random_id()),
            raw: Map::new(),
        }
    }

    /// Question and answer formats for a model whose fields are `fields`.
    pub fn default_for(fields: &[String]) -> Self {
        let front = fields.first().map(String::as_str).unwrap_or("Front");
        let back = fields.get(1).map(String::as_str).unwrap_or(front);
        Self::new(
            "Card 1",
            0,
            format!("{{{{{}}}}}", front),
            format!("{{{{FrontSide}}}}\n\n<hr id=answer>\n\n{{{{{}}}}}", back),
        )
    }

    /// Rewrite every reference to field `old` in this template's format strings.
    pub fn rename_field_references(&mut self, old: &str, new: &str) -> bool {
        let before = (
            self.qfmt.clone(),
            self.afmt.clone(),
            self.bqfmt.clone(),
            self.bafmt.clone(),
        );
        self.qfmt = rename_field_references(&self.qfmt, old, new);
        self.afmt = rename_field_references(&self.afmt, old, new);
        self.bqfmt = rename_field_references(&self.bqfmt, old, new);
        self.bafmt = rename_field_references(&self.bafmt, old, new);
        before != (
            self.qfmt.clone(),
            self.afmt.clone(),
            self.bqfmt.clone(),
            self.bafmt.clone(),
        )
    }

    /// Delete every reference to field `name`. Returns whether anything changed.
    pub fn strip_field_references(&mut self, name: &str) -> bool {
        let mut changed = false;
        for text in [
            &mut self.qfmt,
            &mut self.afmt,
            &mut self.bqfmt,
            &mut self.bafmt,
        ] {
            let stripped = strip_field_references(text, name);
            if stripped != *text {
                *text = stripped;
                changed = true;
            }
        }
        changed
    }

    /// Whether any format string references field `name`.
    pub fn references_field(&self, name: &str) -> bool {
        let re = match field_reference_regex(name) {
            Some(re) => re,
            None => return false,
        };
        [&self.qfmt, &self.afmt, &self.bqfmt, &self.bafmt]
            .iter()
            .any(|text| re.is_match(text))
    }
}

/// A note type.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub kind: ModelKind,
    pub fields: Vec<Field>,
    pub templates: Vec<Template>,
    pub css: String,
    /// Index of the field used for sorting in the browser
    pub sortf: usize,
    pub did: Option<i64>,
    pub modified: i64,
    pub usn: i64,
    /// Render requirements per template, kept opaque apart from ordinal remaps
    pub req: Value,
    /// JSON object this model was loaded from; holds latex settings and unknown keys.
    pub raw: Map<String, Value>,
}

impl Identified for Model {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Model {
    /// A new model with default styling. `templates` may be empty, in which
    /// case a single default template is generated.
    pub fn new(
        id: ModelId,
        name: impl Into<String>,
        kind: ModelKind,
        field_names: &[String],
        templates: Vec<Template>,
    ) -> Self {
        let fields: Vec<Field> = field_names
            .iter()
            .enumerate()
            .map(|(ord, name)| Field::new(name.clone(), ord))
            .collect();
        let mut templates = if templates.is_empty() {
            vec![Template::default_for(field_names)]
        } else {
            templates
        };
        for (ord, template) in templates.iter_mut().enumerate() {
            template.ord = ord;
        }
        let req = Value::Array(
            (0..templates.len())
                .map(|ord| json!([ord, "any", [0]]))
                .collect(),
        );

        let mut raw = Map::new();
        raw.insert("latexPre".to_string(), json!(DEFAULT_LATEX_PRE));
        raw.insert("latexPost".to_string(), json!(DEFAULT_LATEX_POST));
        raw.insert("latexsvg".to_string(), json!(false));
        raw.insert("tags".to_string(), json!([]));
        raw.insert("vers".to_string(), json!([]));

        Self {
            id,
            name: name.into(),
            kind,
            fields,
            templates,
            css: DEFAULT_CSS.to_string(),
            sortf: 0,
            did: None,
            modified: 0,
            usn: -1,
            req,
            raw,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn template_index(&self, name: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.name == name)
    }

    pub fn is_cloze(&self) -> bool {
        self.kind == ModelKind::Cloze
    }

    /// Reassign field ordinals to match vector positions.
    pub fn renumber_fields(&mut self) {
        for (ord, field) in self.fields.iter_mut().enumerate() {
            field.ord = ord;
        }
    }

    pub fn renumber_templates(&mut self) {
        for (ord, template) in self.templates.iter_mut().enumerate() {
            template.ord = ord;
        }
    }

    /// Apply an ordinal remap to the field lists inside `req`.
    ///
    /// `map` returns the new ordinal, or `None` to drop the reference.
    pub fn remap_req_fields(&mut self, map: impl Fn(usize) -> Option<usize>) {
        let rows = match self.req.as_array_mut() {
            Some(rows) => rows,
            None => return,
        };
        for row in rows.iter_mut() {
            if let Some(ords) = row.get_mut(2).and_then(Value::as_array_mut) {
                let remapped: Vec<Value> = ords
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|ord| map(ord as usize))
                    .map(|ord| json!(ord))
                    .collect();
                *ords = remapped;
            }
        }
    }
}

fn field_reference_regex(name: &str) -> Option<Regex> {
    // {{Name}}, {{filter:Name}}, {{#Name}}, {{^Name}}, {{/Name}}, with optional padding
    let pattern = format!(
        r"\{{\{{(\s*[#^/]?\s*)((?:[^{{}}:]+:)*)(\s*){}(\s*)\}}\}}",
        regex::escape(name)
    );
    Regex::new(&pattern).ok()
}

/// Replace references to field `old` with `new` in template text.
pub fn rename_field_references(text: &str, old: &str, new: &str) -> String {
    if old.is_empty() || !text.contains(old) {
        return text.to_string();
    }
    match field_reference_regex(old) {
        Some(re) => re
            .replace_all(text, |caps: &Captures<'_>| {
                format!("{{{{{}{}{}{}{}}}}}", &caps[1], &caps[2], &caps[3], new, &caps[4])
            })
            .into_owned(),
        None => text.to_string(),
    }
}

/// Remove references to field `name` from template text.
pub fn strip_field_references(text: &str, name: &str) -> String {
    if name.is_empty() || !text.contains(name) {
        return text.to_string();
    }
    match field_reference_regex(name) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}
