//! Archive container and collection database storage.

pub mod apkg;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use apkg::ApkgArchive;
pub use sqlite::CollectionDb;
pub use traits::ArchiveContainer;
pub use types::{
    ArchiveContents, ArchiveEntry, CardRow, ColRow, EntryCompression, GraveRow, NoteRow,
    RawCollection, WriteStats, DATABASE_ANKI2, DATABASE_ANKI21,
};
