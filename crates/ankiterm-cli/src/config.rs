use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_KEY_ENV, DEFAULT_OPENAI_MODEL, DEFAULT_POPULATE_CONCURRENCY,
    DEFAULT_POPULATE_TIMEOUT_SECS, MAX_POPULATE_CONCURRENCY,
};
use crate::ui::Format;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnkitermConfig {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub populators: PopulatorSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<Format>,
    #[serde(default)]
    pub ascii: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulatorSection {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub openai_model: String,
    pub api_key_env: String,
}

impl Default for PopulatorSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POPULATE_TIMEOUT_SECS,
            concurrency: DEFAULT_POPULATE_CONCURRENCY,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl PopulatorSection {
    pub fn concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_POPULATE_CONCURRENCY)
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn read_config(path: &Path) -> anyhow::Result<AnkitermConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    parse_config(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

fn parse_config(contents: &str) -> Result<AnkitermConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("ankiterm"));
        }
    }
    Ok(home_dir()?.join(".config").join("ankiterm"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
