//! Row mapping for the collection tables.

use rusqlite::Row;

use crate::storage::types::{CardRow, ColRow, GraveRow, NoteRow};

pub(super) const COL_COLUMNS: &str =
    "id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags";

pub(super) const NOTE_COLUMNS: &str =
    "id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data";

pub(super) const CARD_COLUMNS: &str =
    "id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, lapses, left, odue, odid, flags, data";

pub(super) const GRAVE_COLUMNS: &str = "usn, oid, type";

pub(super) fn col_row(row: &Row<'_>) -> rusqlite::Result<ColRow> {
    Ok(ColRow {
        id: row.get(0)?,
        crt: row.get(1)?,
        modified: row.get(2)?,
        scm: row.get(3)?,
        ver: row.get(4)?,
        dty: row.get(5)?,
        usn: row.get(6)?,
        ls: row.get(7)?,
        conf: row.get(8)?,
        models: row.get(9)?,
        decks: row.get(10)?,
        dconf: row.get(11)?,
        tags: row.get(12)?,
    })
}

pub(super) fn note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        guid: row.get(1)?,
        mid: row.get(2)?,
        modified: row.get(3)?,
        usn: row.get(4)?,
        tags: row.get(5)?,
        flds: row.get(6)?,
        sfld: row.get(7)?,
        csum: row.get(8)?,
        flags: row.get(9)?,
        data: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
    })
}

pub(super) fn card_row(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        nid: row.get(1)?,
        did: row.get(2)?,
        ord: row.get(3)?,
        modified: row.get(4)?,
        usn: row.get(5)?,
        card_type: row.get(6)?,
        queue: row.get(7)?,
        due: row.get(8)?,
        ivl: row.get(9)?,
        factor: row.get(10)?,
        reps: row.get(11)?,
        lapses: row.get(12)?,
        left: row.get(13)?,
        odue: row.get(14)?,
        odid: row.get(15)?,
        flags: row.get(16)?,
        data: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
    })
}

pub(super) fn grave_row(row: &Row<'_>) -> rusqlite::Result<GraveRow> {
    Ok(GraveRow {
        usn: row.get(0)?,
        oid: row.get(1)?,
        kind: row.get(2)?,
    })
}
