//! Builds small `.apkg` archives on disk for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use ankiterm_core::model::field_checksum;
use ankiterm_core::storage::sqlite::CollectionDb;
use rusqlite::params;
use serde_json::{json, Map, Value};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const BASIC_ID: i64 = 1_600_000_000_001;
pub const TARGET_ID: i64 = 1_600_000_000_002;
pub const DECK_ID: i64 = 1;

/// Which database entry the archive carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Anki2,
    Anki21,
}

struct ModelSpec {
    id: i64,
    name: String,
    fields: Vec<String>,
    templates: Vec<String>,
}

struct NoteSpec {
    id: i64,
    mid: i64,
    values: Vec<String>,
    tags: String,
}

/// Fluent builder for a collection archive.
pub struct Fixture {
    flavor: Flavor,
    models: Vec<ModelSpec>,
    notes: Vec<NoteSpec>,
    cards: Vec<(i64, i64, i64)>,
    revlog: Vec<i64>,
}

impl Fixture {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            models: Vec::new(),
            notes: Vec::new(),
            cards: Vec::new(),
            revlog: Vec::new(),
        }
    }

    /// The usual layout: Basic (Front/Back) with two notes and a Target
    /// model (P/Q/R) with two templates and no notes.
    pub fn standard(flavor: Flavor) -> Self {
        Self::new(flavor)
            .model(BASIC_ID, "Basic", &["Front", "Back"], &["Card 1"])
            .model(TARGET_ID, "Target", &["P", "Q", "R"], &["Card 1", "Reverse"])
            .note(10, BASIC_ID, &["猫好き", "likes cats"], " japanese ")
            .note(11, BASIC_ID, &["犬好き", "likes dogs"], "")
            .card(1000, 10, 0)
            .card(1001, 11, 0)
            .review(1000)
    }

    pub fn model(mut self, id: i64, name: &str, fields: &[&str], templates: &[&str]) -> Self {
        self.models.push(ModelSpec {
            id,
            name: name.to_string(),
            fields: fields.iter().map(|s| s.to_string()).collect(),
            templates: templates.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn note(mut self, id: i64, mid: i64, values: &[&str], tags: &str) -> Self {
        self.notes.push(NoteSpec {
            id,
            mid,
            values: values.iter().map(|s| s.to_string()).collect(),
            tags: tags.to_string(),
        });
        self
    }

    pub fn card(mut self, id: i64, nid: i64, ord: i64) -> Self {
        self.cards.push((id, nid, ord));
        self
    }

    /// Add a review log entry for a card.
    pub fn review(mut self, card_id: i64) -> Self {
        self.revlog.push(card_id);
        self
    }

    fn models_json(&self) -> Value {
        let anki21 = self.flavor == Flavor::Anki21;
        let mut models = Map::new();
        for (n, model) in self.models.iter().enumerate() {
            let flds: Vec<Value> = model
                .fields
                .iter()
                .enumerate()
                .map(|(ord, name)| {
                    let mut field = json!({
                        "name": name,
                        "ord": ord,
                        "sticky": false,
                        "rtl": false,
                        "font": "Arial",
                        "size": 20,
                        "media": []
                    });
                    if anki21 {
                        let obj = field.as_object_mut().expect("field is an object");
                        obj.insert("description".into(), json!(""));
                        obj.insert("plainText".into(), json!(false));
                        obj.insert("collapsed".into(), json!(false));
                        obj.insert("excludeFromSearch".into(), json!(false));
                        obj.insert("id".into(), json!(7_000_000 + n as i64 * 100 + ord as i64));
                        obj.insert("tag".into(), Value::Null);
                        obj.insert("preventDeletion".into(), json!(false));
                    }
                    field
                })
                .collect();
            let tmpls: Vec<Value> = model
                .templates
                .iter()
                .enumerate()
                .map(|(ord, name)| {
                    let (q, a) = (&model.fields[0], &model.fields[model.fields.len() - 1]);
                    let mut template = json!({
                        "name": name,
                        "ord": ord,
                        "qfmt": format!("{{{{{}}}}}", if ord == 0 { q } else { a }),
                        "afmt": format!("{{{{FrontSide}}}}<hr id=answer>{{{{{}}}}}", if ord == 0 { a } else { q }),
                        "bqfmt": "",
                        "bafmt": "",
                        "did": Value::Null
                    });
                    if anki21 {
                        let obj = template.as_object_mut().expect("template is an object");
                        obj.insert("bfont".into(), json!(""));
                        obj.insert("bsize".into(), json!(0));
                        obj.insert("id".into(), json!(8_000_000 + n as i64 * 100 + ord as i64));
                    }
                    template
                })
                .collect();
            let req: Vec<Value> = (0..model.templates.len())
                .map(|ord| json!([ord, "any", [0]]))
                .collect();
            models.insert(
                model.id.to_string(),
                json!({
                    "id": model.id,
                    "name": model.name,
                    "type": 0,
                    "mod": 1_600_000_000,
                    "usn": -1,
                    "sortf": 0,
                    "did": DECK_ID,
                    "tmpls": tmpls,
                    "flds": flds,
                    "css": ".card { font-family: arial; }",
                    "latexPre": "\\documentclass[12pt]{article}",
                    "latexPost": "\\end{document}",
                    "tags": [],
                    "vers": [],
                    "req": req
                }),
            );
        }
        Value::Object(models)
    }

    /// Database image for this fixture.
    pub fn database(&self) -> Vec<u8> {
        let db = CollectionDb::create_empty().expect("create should succeed");
        let conn = db.connection();

        let conf = json!({
            "curModel": BASIC_ID.to_string(),
            "curDeck": DECK_ID,
            "schedVer": 2,
            "nextPos": 3,
            "activeDecks": [DECK_ID]
        });
        let decks = json!({
            "1": {
                "id": DECK_ID,
                "name": "Default",
                "conf": 1,
                "desc": "",
                "dyn": 0,
                "collapsed": false,
                "mod": 1_600_000_000,
                "usn": -1
            }
        });
        let dconf = json!({ "1": { "id": 1, "name": "Default", "new": { "perDay": 20 } } });
        let tags = json!({ "japanese": 0 });

        conn.execute(
            "INSERT INTO col VALUES (1, 1600000000, 1600000000000, 1600000000000, 11, 0, 0, 0, ?, ?, ?, ?, ?)",
            params![
                conf.to_string(),
                self.models_json().to_string(),
                decks.to_string(),
                dconf.to_string(),
                tags.to_string()
            ],
        )
        .expect("col insert should succeed");

        for note in &self.notes {
            conn.execute(
                "INSERT INTO notes VALUES (?, ?, ?, 1600000000, -1, ?, ?, ?, ?, 0, '')",
                params![
                    note.id,
                    format!("guid-{}", note.id),
                    note.mid,
                    note.tags,
                    note.values.join("\x1f"),
                    note.values[0],
                    field_checksum(&note.values[0])
                ],
            )
            .expect("note insert should succeed");
        }

        for (n, (id, nid, ord)) in self.cards.iter().enumerate() {
            conn.execute(
                "INSERT INTO cards VALUES (?, ?, ?, ?, 1600000000, -1, 2, 2, ?, 12, 2500, 4, 1, 0, 0, 0, 0, '')",
                params![id, nid, DECK_ID, ord, 100 + n as i64],
            )
            .expect("card insert should succeed");
        }

        for (n, cid) in self.revlog.iter().enumerate() {
            conn.execute(
                "INSERT INTO revlog VALUES (?, ?, -1, 3, 12, 4, 2500, 6000, 1)",
                params![1_600_000_000_000 + n as i64, cid],
            )
            .expect("revlog insert should succeed");
        }

        db.to_bytes().expect("serialize should succeed")
    }

    /// Write the archive as `name` inside `dir`.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let database = self.database();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

        match self.flavor {
            Flavor::Anki21 => {
                // Newer exports ship a placeholder legacy database next to the real one.
                writer.start_file("collection.anki2", deflated).expect("zip entry");
                writer.write_all(b"placeholder").expect("zip write");
                writer.start_file("collection.anki21", deflated).expect("zip entry");
                writer.write_all(&database).expect("zip write");
            }
            Flavor::Anki2 => {
                writer.start_file("collection.anki2", deflated).expect("zip entry");
                writer.write_all(&database).expect("zip write");
            }
        }
        writer.start_file("media", deflated).expect("zip entry");
        writer.write_all(br#"{"0": "cat.jpg"}"#).expect("zip write");
        writer.start_file("0", stored).expect("zip entry");
        writer.write_all(&[0xff, 0xd8, 0xff, 0xe0]).expect("zip write");

        let bytes = writer.finish().expect("zip finish").into_inner();
        let path = dir.join(name);
        fs::write(&path, bytes).expect("archive write should succeed");
        path
    }
}

/// Raw rows of the database entry inside an archive on disk.
pub fn read_rows(path: &Path) -> ankiterm_core::storage::RawCollection {
    use ankiterm_core::ArchiveContainer;

    let contents = ankiterm_core::ApkgArchive::open(path).expect("open should succeed");
    CollectionDb::from_bytes(contents.database())
        .expect("database should load")
        .read()
        .expect("read should succeed")
}

/// Database bytes inside an archive on disk.
pub fn database_bytes(path: &Path) -> Vec<u8> {
    use ankiterm_core::ArchiveContainer;

    ankiterm_core::ApkgArchive::open(path)
        .expect("open should succeed")
        .database()
        .to_vec()
}

/// Number of review log rows inside an archive on disk.
pub fn revlog_count(path: &Path) -> i64 {
    use ankiterm_core::ArchiveContainer;

    let contents = ankiterm_core::ApkgArchive::open(path).expect("open should succeed");
    let db = CollectionDb::from_bytes(contents.database()).expect("database should load");
    db.connection()
        .query_row("SELECT count(*) FROM revlog", [], |row| row.get(0))
        .expect("count should succeed")
}
