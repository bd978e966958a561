//! Output formatting for operation results.
//!
//! Read operations render their `data` as key/value lines and tables;
//! write operations render a receipt. JSON mode prints the report as is.

mod json;
mod text;

pub use json::{batch_json, report_json};
pub use text::{print_listing, print_report};
