//! In-memory SQLite access to a collection database.
//!
//! The database image is deserialized into an in-memory connection, read
//! into raw rows, and on save only rows that differ from the loaded baseline
//! are written before the image is serialized back to bytes. Tables the core
//! does not model (`revlog`, newer auxiliary tables) are never touched.

mod row;

use std::collections::HashMap;
use std::ptr::NonNull;

use log::debug;
use rusqlite::serialize::OwnedData;
use rusqlite::{params, Connection, DatabaseName, Transaction};

use crate::error::{AnkiError, Result};
use crate::storage::types::{CardRow, GraveRow, NoteRow, RawCollection, WriteStats};

use row::{card_row, col_row, grave_row, note_row};
use row::{CARD_COLUMNS, COL_COLUMNS, GRAVE_COLUMNS, NOTE_COLUMNS};

/// DDL for the tables shared by both schema generations.
pub const COLLECTION_SCHEMA: &str = r#"
CREATE TABLE col (
    id              integer primary key,
    crt             integer not null,
    mod             integer not null,
    scm             integer not null,
    ver             integer not null,
    dty             integer not null,
    usn             integer not null,
    ls              integer not null,
    conf            text not null,
    models          text not null,
    decks           text not null,
    dconf           text not null,
    tags            text not null
);
CREATE TABLE notes (
    id              integer primary key,
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            integer not null,
    csum            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE cards (
    id              integer primary key,
    nid             integer not null,
    did             integer not null,
    ord             integer not null,
    mod             integer not null,
    usn             integer not null,
    type            integer not null,
    queue           integer not null,
    due             integer not null,
    ivl             integer not null,
    factor          integer not null,
    reps            integer not null,
    lapses          integer not null,
    left            integer not null,
    odue            integer not null,
    odid            integer not null,
    flags           integer not null,
    data            text not null
);
CREATE TABLE revlog (
    id              integer primary key,
    cid             integer not null,
    usn             integer not null,
    ease            integer not null,
    ivl             integer not null,
    lastIvl         integer not null,
    factor          integer not null,
    time            integer not null,
    type            integer not null
);
CREATE TABLE graves (
    usn             integer not null,
    oid             integer not null,
    type            integer not null
);
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
"#;

/// An opened collection database held entirely in memory.
pub struct CollectionDb {
    conn: Connection,
}

impl CollectionDb {
    /// Deserialize a database image.
    ///
    /// # Errors
    ///
    /// Returns `AnkiError::Storage` if the bytes are empty or not a SQLite
    /// database.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut image = bytes.to_vec();
        // The in-memory VFS has no WAL support; fall back to rollback journal.
        if image.len() > 19 && (image[18] == 2 || image[19] == 2) {
            debug!("Database header requests WAL, switching to rollback journal");
            image[18] = 1;
            image[19] = 1;
        }

        let mut conn = Connection::open_in_memory()?;
        let owned = Self::owned_data_from_bytes(&image)?;
        conn.deserialize(DatabaseName::Main, owned, false)?;

        let tables: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'col'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(AnkiError::Schema(
                "database has no col table".to_string(),
            ));
        }

        Ok(Self { conn })
    }

    /// Create a fresh database with the shared collection tables.
    pub fn create_empty() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(COLLECTION_SCHEMA)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serialize the database image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let data = self.conn.serialize(DatabaseName::Main)?;
        Ok(data.as_ref().to_vec())
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(AnkiError::Storage("SQLite payload is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| AnkiError::Storage("SQLite payload too large".to_string()))?;

        // SAFETY: sqlite3_malloc returns a valid pointer or null; null is
        // rejected immediately below.
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        if raw.is_null() {
            return Err(AnkiError::Storage("SQLite allocation failed".to_string()));
        }

        // SAFETY:
        // - `raw` is non-null and writable for `size` bytes, and size == bytes.len()
        // - `bytes` is valid for reads of its length and does not overlap `raw`
        // - `OwnedData::from_raw_nonnull` takes ownership of the sqlite3_malloc'd
        //   buffer, which SQLite frees when the data is dropped or consumed
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len());
            let ptr = NonNull::new(raw).ok_or_else(|| {
                AnkiError::Storage("SQLite allocation returned null".to_string())
            })?;
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    /// Read every modelled table.
    ///
    /// # Errors
    ///
    /// Returns `AnkiError::Schema` unless `col` holds exactly one row.
    pub fn read(&self) -> Result<RawCollection> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM col", COL_COLUMNS))?;
        let mut cols = stmt
            .query_map([], col_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if cols.len() != 1 {
            return Err(AnkiError::Schema(format!(
                "col table must hold exactly one row, found {}",
                cols.len()
            )));
        }
        let col = cols.remove(0);

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM notes ORDER BY id", NOTE_COLUMNS))?;
        let notes = stmt
            .query_map([], note_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM cards ORDER BY id", CARD_COLUMNS))?;
        let cards = stmt
            .query_map([], card_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM graves", GRAVE_COLUMNS))?;
        let graves = stmt
            .query_map([], grave_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(
            "Read collection: {} notes, {} cards, {} graves",
            notes.len(),
            cards.len(),
            graves.len()
        );

        Ok(RawCollection {
            col,
            notes,
            cards,
            graves,
        })
    }

    /// Write the rows of `next` that differ from `baseline` in one transaction.
    pub fn write(&mut self, baseline: &RawCollection, next: &RawCollection) -> Result<WriteStats> {
        let mut stats = WriteStats::default();
        let tx = self.conn.transaction()?;

        if baseline.col != next.col {
            let c = &next.col;
            tx.execute(
                "UPDATE col SET id = ?, crt = ?, mod = ?, scm = ?, ver = ?, dty = ?, usn = ?, ls = ?,
                 conf = ?, models = ?, decks = ?, dconf = ?, tags = ?",
                params![
                    c.id, c.crt, c.modified, c.scm, c.ver, c.dty, c.usn, c.ls, c.conf, c.models,
                    c.decks, c.dconf, c.tags
                ],
            )?;
            stats.col_updated = true;
        }

        sync_rows(
            &tx,
            &baseline.notes,
            &next.notes,
            |n| n.id,
            upsert_note,
            "DELETE FROM notes WHERE id = ?",
            &mut stats,
        )?;
        sync_rows(
            &tx,
            &baseline.cards,
            &next.cards,
            |c| c.id,
            upsert_card,
            "DELETE FROM cards WHERE id = ?",
            &mut stats,
        )?;

        for grave in next.graves.iter().filter(|g| !baseline.graves.contains(g)) {
            insert_grave(&tx, grave)?;
            stats.inserted += 1;
        }

        tx.commit()?;
        debug!(
            "Wrote collection: col_updated={} inserted={} updated={} deleted={}",
            stats.col_updated, stats.inserted, stats.updated, stats.deleted
        );
        Ok(stats)
    }
}

fn sync_rows<R: PartialEq>(
    tx: &Transaction<'_>,
    baseline: &[R],
    next: &[R],
    id_of: impl Fn(&R) -> i64,
    upsert: impl Fn(&Transaction<'_>, &R) -> rusqlite::Result<usize>,
    delete_sql: &str,
    stats: &mut WriteStats,
) -> Result<()> {
    let before: HashMap<i64, &R> = baseline.iter().map(|r| (id_of(r), r)).collect();
    let mut seen = std::collections::HashSet::with_capacity(next.len());

    for row in next {
        let id = id_of(row);
        seen.insert(id);
        match before.get(&id) {
            Some(old) if *old == row => {}
            Some(_) => {
                upsert(tx, row)?;
                stats.updated += 1;
            }
            None => {
                upsert(tx, row)?;
                stats.inserted += 1;
            }
        }
    }

    for id in before.keys().filter(|id| !seen.contains(id)) {
        tx.execute(delete_sql, [id])?;
        stats.deleted += 1;
    }
    Ok(())
}

fn upsert_note(tx: &Transaction<'_>, n: &NoteRow) -> rusqlite::Result<usize> {
    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO notes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            NOTE_COLUMNS
        ),
        params![
            n.id, n.guid, n.mid, n.modified, n.usn, n.tags, n.flds, n.sfld, n.csum, n.flags, n.data
        ],
    )
}

fn upsert_card(tx: &Transaction<'_>, c: &CardRow) -> rusqlite::Result<usize> {
    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO cards ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            CARD_COLUMNS
        ),
        params![
            c.id,
            c.nid,
            c.did,
            c.ord,
            c.modified,
            c.usn,
            c.card_type,
            c.queue,
            c.due,
            c.ivl,
            c.factor,
            c.reps,
            c.lapses,
            c.left,
            c.odue,
            c.odid,
            c.flags,
            c.data
        ],
    )
}

fn insert_grave(tx: &Transaction<'_>, g: &GraveRow) -> rusqlite::Result<usize> {
    tx.execute(
        &format!("INSERT INTO graves ({}) VALUES (?, ?, ?)", GRAVE_COLUMNS),
        params![g.usn, g.oid, g.kind],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value as SqlValue;

    fn seeded() -> CollectionDb {
        let db = CollectionDb::create_empty().unwrap();
        db.connection()
            .execute_batch(
                "INSERT INTO col VALUES (1, 0, 0, 0, 11, 0, 0, 0, '{}', '{}', '{}', '{}', '{}');
                 INSERT INTO notes VALUES (10, 'g1', 1, 0, 0, '', 'a\x1fb', 'a', 0, 0, '');
                 INSERT INTO notes VALUES (11, 'g2', 1, 0, 0, '', 'c\x1fd', 'c', 0, 0, '');
                 INSERT INTO cards VALUES (100, 10, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, '');",
            )
            .unwrap();
        db
    }

    #[test]
    fn test_unmodified_write_keeps_image() {
        let mut db = seeded();
        let before = db.to_bytes().unwrap();
        let raw = db.read().unwrap();

        let stats = db.write(&raw, &raw.clone()).unwrap();

        assert!(stats.is_empty());
        assert_eq!(db.to_bytes().unwrap(), before);
    }

    #[test]
    fn test_write_applies_diff() {
        let mut db = seeded();
        let baseline = db.read().unwrap();
        let mut next = baseline.clone();
        next.notes[0].flds = "x\x1fy".to_string();
        next.notes[0].sfld = SqlValue::Text("x".to_string());
        next.notes.remove(1);
        next.cards.clear();
        next.graves.push(GraveRow {
            usn: -1,
            oid: 11,
            kind: 1,
        });

        let stats = db.write(&baseline, &next).unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(db.read().unwrap(), next);
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let db = seeded();
        let bytes = db.to_bytes().unwrap();
        let reopened = CollectionDb::from_bytes(&bytes).unwrap();
        assert_eq!(reopened.read().unwrap(), db.read().unwrap());
    }

    #[test]
    fn test_rejects_missing_col() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE other (id integer)").unwrap();
        let bytes = conn.serialize(DatabaseName::Main).unwrap().to_vec();
        assert!(matches!(
            CollectionDb::from_bytes(&bytes),
            Err(AnkiError::Schema(_))
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            CollectionDb::from_bytes(&[]),
            Err(AnkiError::Storage(_))
        ));
    }
}
