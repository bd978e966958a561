//! Output mode routing.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What `--format` or `output.format` asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pretty,
    Plain,
    Json,
}

/// How results actually get printed once the terminal is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Reports and listings as JSON on stdout, nothing else
    Json,
    /// `key=value` lines and tab-separated tables
    #[default]
    Plain,
    /// Colored receipts and boxed tables
    Pretty,
}

impl OutputMode {
    /// `--json` wins over any requested format. A pretty request on a
    /// non-terminal, or under `TERM=dumb`, degrades to plain. With nothing
    /// requested the terminal decides.
    pub fn resolve(
        json_flag: bool,
        requested: Option<Format>,
        is_tty: bool,
        term_is_dumb: bool,
    ) -> Self {
        let fancy = is_tty && !term_is_dumb;
        match (json_flag, requested) {
            (true, _) | (false, Some(Format::Json)) => Self::Json,
            (false, Some(Format::Plain)) => Self::Plain,
            (false, Some(Format::Pretty)) | (false, None) if fancy => Self::Pretty,
            _ => Self::Plain,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_pretty(&self) -> bool {
        matches!(self, Self::Pretty)
    }
}
