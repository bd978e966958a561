//! Application context for the ankiterm CLI.
//!
//! Bundles the parsed arguments with the lazily loaded config file so
//! handlers do not thread both around.

use log::debug;
use once_cell::unsync::OnceCell;

use ankiterm_core::{SaveSummary, Session};

use crate::cli::Cli;
use crate::config::{read_config, AnkitermConfig};
use crate::errors::CliError;
use crate::ui::UiContext;

use super::resolver::{resolve_apkg_path, resolve_config_path};

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<AnkitermConfig>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// The config file, loaded on first use. A missing default file yields
    /// the defaults; a missing file named by ANKITERM_CONFIG is an error.
    pub fn config(&self) -> anyhow::Result<&AnkitermConfig> {
        self.config.get_or_try_init(|| {
            let explicit = std::env::var_os("ANKITERM_CONFIG").is_some();
            let path = resolve_config_path()?;
            if path.exists() {
                debug!("Loading config from {}", path.display());
                read_config(&path)
            } else if explicit {
                Err(CliError::not_found(
                    format!("No config file at {}", path.display()),
                    "unset ANKITERM_CONFIG or point it at an existing file",
                )
                .into())
            } else {
                Ok(AnkitermConfig::default())
            }
        })
    }

    /// UI context from flags, with the config file filling in what they leave unset.
    pub fn ui(&self) -> anyhow::Result<UiContext> {
        let config = self.config()?;
        let format = self.cli.format.or(config.output.format);
        Ok(UiContext::from_env(
            self.cli.json,
            format,
            self.cli.no_color,
            self.cli.ascii || config.output.ascii,
        ))
    }

    /// Open the archive named by `--apkg`.
    pub fn open_session(&self) -> anyhow::Result<Session> {
        let path = resolve_apkg_path(self.cli)?;
        Ok(Session::open(&path)?)
    }

    /// Save to `--output` if given, otherwise in place.
    pub fn save(&self, session: &mut Session) -> anyhow::Result<SaveSummary> {
        Ok(session.save(self.cli.output.as_deref(), self.cli.force)?)
    }
}
