//! # ankiterm core
//!
//! Library for inspecting and restructuring Anki collection archives
//! (`.apkg` / `.colpkg`) without the Anki application.
//!
//! ## Architecture
//!
//! - **storage**: zip container and in-memory SQLite access to the tables
//! - **schema**: translation between database rows and the object model,
//!   for both the `anki2` and `anki21` generations
//! - **model**: collection, models, fields, templates, notes, cards, decks
//! - **path**: `/models/Basic/fields/Front` style addressing
//! - **ops**: validated, atomic operations and read queries
//! - **populators**: per-note field derivation, including an LLM annotator
//! - **session**: lifecycle of one opened archive
//!
//! ```no_run
//! use ankiterm_core::ops::RenameField;
//! use ankiterm_core::Session;
//!
//! # fn main() -> ankiterm_core::Result<()> {
//! let mut session = Session::open("deck.apkg")?;
//! session.apply(&RenameField::new("Basic", "Front", "Question"))?;
//! session.save(None, false)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fs;
pub mod model;
pub mod ops;
pub mod path;
pub mod populators;
pub mod schema;
pub mod session;
pub mod storage;

pub use error::{AnkiError, Result};
pub use model::{Collection, SchemaGeneration};
pub use ops::{Operation, OperationReport, Query};
pub use path::{resolve, Locator, Resolved};
pub use session::{SaveSummary, Session};
pub use storage::{ApkgArchive, ArchiveContainer};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
