//! Input parsing helpers for the CLI.

mod parsing;

pub use parsing::{parse_pairs, parse_template, read_populator_config};
