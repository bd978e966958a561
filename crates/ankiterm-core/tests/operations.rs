mod common;

use std::collections::BTreeMap;

use ankiterm_core::ops::{
    self, AddField, AddModel, AddTemplate, CountOp, DivideDecks, GetOp, ListOp, MigrateNotes,
    RemoveEmptyNotes, RemoveField, RenameField, RenameModel, TagNotes, TemplateSpec,
};
use ankiterm_core::session::UNDO_DEPTH;
use ankiterm_core::{resolve, AnkiError, Operation, Resolved, Session};
use serde_json::json;

use common::{read_rows, Fixture, Flavor, BASIC_ID, DECK_ID, TARGET_ID};

const XYZ_ID: i64 = 1_600_000_000_003;

fn open_standard(dir: &tempfile::TempDir) -> Session {
    let path = Fixture::standard(Flavor::Anki21).write(dir.path(), "deck.apkg");
    Session::open(path).expect("open should succeed")
}

fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

fn assert_field_counts(session: &Session) {
    let collection = session.collection();
    for note in collection.notes.values() {
        let model = collection.model(note.model_id).expect("note model exists");
        assert_eq!(note.fields.len(), model.fields.len(), "note {}", note.id);
    }
}

#[test]
fn test_resolve_field_address() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = open_standard(&dir);

    match resolve(session.collection(), "/models/Basic/fields/Front").expect("resolve") {
        Resolved::Field(model, field) => {
            assert_eq!(model.id, BASIC_ID);
            assert_eq!(field.name, "Front");
        }
        other => panic!("expected a field, got {:?}", other),
    }

    let err = resolve(session.collection(), "/models/Basic/fields/Nonexistent").unwrap_err();
    match err {
        AnkiError::NotFound { segment, .. } => assert_eq!(segment, "Nonexistent"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_list_and_count_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = open_standard(&dir);

    let count = session
        .query(&CountOp::new("/notes/Basic").expect("path parses"))
        .expect("count should succeed");
    assert_eq!(count.data.expect("data")["count"], 2);

    let listed = session
        .query(&ListOp::new("/models").expect("path parses"))
        .expect("list should succeed");
    assert_eq!(listed.message, "2 item(s) at /models");

    let info = session.info().expect("info should succeed");
    let data = info.data.expect("data");
    assert_eq!(data["media"], 1);
    assert_eq!(data["notes"], 2);
}

#[test]
fn test_field_count_invariant_through_edits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    let steps: Vec<Box<dyn Operation>> = vec![
        Box::new(AddField::new("Basic", "Extra").at(1).with_default("-")),
        Box::new(RenameField::new("Basic", "Extra", "Hint")),
        Box::new(RemoveField::new("Basic", "Back")),
        Box::new(AddField::new("Target", "S")),
    ];
    for step in &steps {
        session.apply(step.as_ref()).expect("step should succeed");
        assert_field_counts(&session);
    }

    let note = &session.collection().notes[&10];
    assert_eq!(note.fields, vec!["猫好き", "-"]);
}

#[test]
fn test_rename_there_and_back_restores_templates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);
    let before = session
        .collection()
        .lookup_model("Basic")
        .expect("model")
        .templates
        .clone();

    session
        .apply(&RenameField::new("Basic", "Front", "Question"))
        .expect("rename should succeed");
    session
        .apply(&RenameField::new("Basic", "Question", "Front"))
        .expect("rename back should succeed");

    let after = &session.collection().lookup_model("Basic").expect("model").templates;
    assert_eq!(after, &before);
}

#[test]
fn test_migrate_notes_maps_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Fixture::new(Flavor::Anki21)
        .model(XYZ_ID, "XYZ", &["X", "Y", "Z"], &["Card 1"])
        .model(TARGET_ID, "Target", &["P", "Q", "R"], &["Card 1", "Reverse"])
        .note(20, XYZ_ID, &["A", "B", "C"], "")
        .card(2000, 20, 0)
        .write(dir.path(), "deck.apkg");
    let mut session = Session::open(&path).expect("open should succeed");

    let report = session
        .apply(&MigrateNotes::new(
            "XYZ",
            "Target",
            mapping(&[("X", "P"), ("Z", "Q")]),
        ))
        .expect("migrate should succeed");
    assert!(report.has_changes());
    assert_field_counts(&session);

    let note = &session.collection().notes[&20];
    assert_eq!(note.model_id, TARGET_ID);
    assert_eq!(note.fields, vec!["A", "C", ""]);
    assert_eq!(session.collection().cards[&2000].ord, 0);

    session.save(None, false).expect("save should succeed");
    let rows = read_rows(&path);
    assert_eq!(rows.notes[0].mid, TARGET_ID);
    assert_eq!(rows.notes[0].flds, "A\x1fC\x1f");
}

#[test]
fn test_failed_migration_leaves_everything_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);
    let before = session.collection().clone();

    let err = session
        .apply(&MigrateNotes::new(
            "Basic",
            "Target",
            mapping(&[("Front", "P"), ("Back", "Nope")]),
        ))
        .unwrap_err();

    assert!(matches!(err, AnkiError::Validation(_)));
    assert_eq!(session.collection(), &before);
    assert!(!session.is_modified());
    assert!(!session.can_undo());
}

#[test]
fn test_tag_notes_matching_pattern() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    let report = session
        .apply(&TagNotes::new(Some("Basic".to_string()), "Front", "^猫", "cat"))
        .expect("tagging should succeed");
    assert_eq!(report.changes.len(), 1);

    let notes = &session.collection().notes;
    assert!(notes[&10].has_tag("cat"));
    assert!(notes[&10].has_tag("japanese"));
    assert!(!notes[&11].has_tag("cat"));

    let path = session.path().to_path_buf();
    session.save(None, false).expect("save should succeed");
    let rows = read_rows(&path);
    let tagged = rows.notes.iter().find(|n| n.id == 10).expect("note 10");
    assert!(tagged.tags.contains("cat"));
    let registry: serde_json::Value =
        serde_json::from_str(&rows.col.tags).expect("tags column is JSON");
    assert!(registry.get("cat").is_some());
}

#[test]
fn test_model_operations_persist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    let add = AddModel::new("Vocab", vec!["Word".to_string(), "Meaning".to_string()])
        .with_template(TemplateSpec::new("Recall", "{{Word}}", "{{Meaning}}"));
    let rename = RenameModel::new("Target", "Sentence");
    let template = AddTemplate::new(
        "Vocab",
        TemplateSpec::new("Reverse", "{{Meaning}}", "{{Word}}"),
    );
    session
        .apply_batch(&[&add, &rename, &template])
        .expect("batch should succeed");

    session.save(None, false).expect("save should succeed");
    let reopened = Session::open(session.path()).expect("reopen should succeed");
    let collection = reopened.collection();
    let vocab = collection.lookup_model("Vocab").expect("new model");
    assert_eq!(vocab.field_names(), vec!["Word", "Meaning"]);
    assert_eq!(vocab.templates.len(), 2);
    assert!(collection.lookup_model("Sentence").is_ok());
    assert!(collection.lookup_model("Target").is_err());
}

#[test]
fn test_remove_empty_notes_records_graves() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Fixture::standard(Flavor::Anki2)
        .note(12, BASIC_ID, &["", "orphan answer"], "")
        .card(1002, 12, 0)
        .write(dir.path(), "deck.apkg");
    let mut session = Session::open(&path).expect("open should succeed");

    session
        .apply(&RemoveEmptyNotes::new(
            Some("Basic".to_string()),
            vec!["Front".to_string()],
        ))
        .expect("removal should succeed");
    session.save(None, false).expect("save should succeed");

    let rows = read_rows(&path);
    assert_eq!(rows.notes.len(), 2);
    assert_eq!(rows.cards.len(), 2);
    let kinds: Vec<(i64, i64)> = rows.graves.iter().map(|g| (g.oid, g.kind)).collect();
    assert!(kinds.contains(&(12, 1)));
    assert!(kinds.contains(&(1002, 0)));
}

#[test]
fn test_undo_reverts_last_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    session
        .apply(&RenameField::new("Basic", "Front", "Question"))
        .expect("rename should succeed");
    session
        .apply(&AddField::new("Basic", "Notes"))
        .expect("add should succeed");

    assert!(session.undo());
    let model = session.collection().lookup_model("Basic").expect("model");
    assert_eq!(model.field_names(), vec!["Question", "Back"]);

    assert!(session.undo());
    assert!(!session.undo());
    assert!(!session.is_modified());
}

#[test]
fn test_undo_history_is_bounded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    let names = ["Front", "Question"];
    for step in 0..UNDO_DEPTH + 3 {
        let (old, new) = (names[step % 2], names[(step + 1) % 2]);
        session
            .apply(&RenameField::new("Basic", old, new))
            .expect("rename should succeed");
    }

    let mut undone = 0;
    while session.undo() {
        undone += 1;
    }
    assert_eq!(undone, UNDO_DEPTH);
}

#[test]
fn test_get_model_css_and_example() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = open_standard(&dir);

    let css = session
        .query(&GetOp::new("/models/Basic/css").expect("path parses"))
        .expect("get should succeed");
    assert_eq!(css.data.expect("data")["model"], "Basic");

    let example = session
        .query(&GetOp::new("/models/Basic/example").expect("path parses"))
        .expect("get should succeed");
    let data = example.data.expect("data");
    assert_eq!(data["example"]["fields"]["Front"], "猫好き");

    let err = session
        .query(&GetOp::new("/models/Nope").expect("path parses"))
        .unwrap_err();
    assert!(matches!(err, AnkiError::NotFound { .. }));
}

#[test]
fn test_divide_decks_persists_new_decks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Fixture::new(Flavor::Anki2)
        .model(BASIC_ID, "Basic", &["Front", "Back"], &["Card 1"])
        .note(10, BASIC_ID, &["一", "one"], " anime_ep01 ")
        .note(11, BASIC_ID, &["二", "two"], " anime_ep12 anime_ep14 ")
        .note(12, BASIC_ID, &["三", "three"], " unrelated ")
        .card(1000, 10, 0)
        .card(1001, 11, 0)
        .card(1002, 12, 0)
        .write(dir.path(), "deck.apkg");
    let mut session = Session::open(&path).expect("open should succeed");

    let mut op = DivideDecks::new("Default", "anime", r"ep(\d+)", 10);
    op.target_prefix = Some("Anime".to_string());
    let report = session.apply(&op).expect("divide should succeed");
    assert_eq!(report.message, "moved 2 card(s) to 2 deck(s), skipped 1 card(s)");
    session.save(None, false).expect("save should succeed");

    let reopened = Session::open(&path).expect("reopen should succeed");
    let collection = reopened.collection();
    let first = collection.lookup_deck("Anime 1-10").expect("first range deck");
    let second = collection.lookup_deck("Anime 11-20").expect("second range deck");
    assert_eq!(collection.cards[&1000].deck_id, first.id);
    assert_eq!(collection.cards[&1001].deck_id, second.id);
    assert_eq!(collection.cards[&1002].deck_id, DECK_ID);

    let rows = read_rows(&path);
    assert!(rows.col.decks.contains("Anime 11-20"));
}

#[test]
fn test_script_batch_from_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = open_standard(&dir);

    let steps = vec![
        ops::from_json("add-field", json!({"model": "Basic", "field": "Reading"}))
            .expect("step parses"),
        ops::from_json(
            "populate-fields",
            json!({
                "model": "Basic",
                "populator": "copy-field",
                "config": {"source_field": "Front", "target_field": "Reading"}
            }),
        )
        .expect("step parses"),
    ];
    let refs: Vec<&dyn Operation> = steps.iter().map(|s| s.as_ref()).collect();
    let reports = session.apply_batch(&refs).expect("batch should succeed");

    assert_eq!(reports.len(), 2);
    assert_eq!(session.collection().notes[&11].fields[2], "犬好き");
    assert!(session.undo());
    assert!(!session.is_modified());
}
