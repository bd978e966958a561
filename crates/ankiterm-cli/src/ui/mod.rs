//! UI primitives for the ankiterm CLI.
//!
//! - **Context**: environment detection (TTY, width, color, unicode)
//! - **Mode**: output mode resolution (json, plain, pretty)
//! - **Theme**: badges, styles, spinner frames
//! - **Render**: tables, headers, receipts, hints
//! - **Progress**: spinner for populate runs
//! - **Format**: string helpers for table cells

mod context;
pub mod format;
mod mode;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use mode::Format;
pub use progress::Spinner;
pub use theme::Badge;

pub use render::{
    blank_line, header, hint, kv, print, print_error, receipt, simple_table, table, Column,
};
