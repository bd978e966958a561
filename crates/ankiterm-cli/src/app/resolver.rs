//! Path resolution for the config file and the archive.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::default_config_path;
use crate::errors::CliError;

/// Resolve the config file path, checking ANKITERM_CONFIG first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("ANKITERM_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Resolve the archive path from `--apkg` / `ANKITERM_APKG`.
pub fn resolve_apkg_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    let path = cli.apkg.clone().ok_or_else(|| {
        CliError::not_found(
            "No archive given",
            "pass --apkg deck.apkg or set ANKITERM_APKG",
        )
    })?;
    if !path.exists() {
        return Err(CliError::not_found(
            missing_apkg_message(&path),
            "check the path, or export the deck from Anki as a .apkg file",
        )
        .into());
    }
    Ok(path)
}

fn missing_apkg_message(path: &Path) -> String {
    format!("No archive found at {}", path.display())
}
