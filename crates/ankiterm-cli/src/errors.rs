//! CLI error types for structured error handling.
//!
//! Typed errors map to specific exit codes. Core errors are classified into
//! the same codes by [`exit_code_for`].

use std::fmt;

use ankiterm_core::AnkiError;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (archive, config, model, field, etc.)
    NotFound { message: String, hint: String },

    /// Invalid user input (flags, script files, config files)
    InvalidInput(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, .. } | CliError::InvalidInput(message) => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            CliError::NotFound { hint, .. } => Some(hint),
            CliError::InvalidInput(_) => None,
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        use super::constants::exit_codes;
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
        }
    }
}

/// Exit code for an error from anywhere in a handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    use super::constants::exit_codes;

    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    match err.downcast_ref::<AnkiError>() {
        Some(AnkiError::NotFound { .. }) => exit_codes::NOT_FOUND,
        Some(
            AnkiError::Validation(_)
            | AnkiError::InvalidPath(_)
            | AnkiError::InvalidInput(_)
            | AnkiError::Ambiguous { .. },
        ) => exit_codes::INVALID_INPUT,
        Some(AnkiError::Schema(_)) => exit_codes::SCHEMA,
        Some(AnkiError::Integrity(_)) => exit_codes::INTEGRITY_FAILED,
        Some(AnkiError::ExternalService(_)) => exit_codes::EXTERNAL_SERVICE,
        Some(AnkiError::Storage(_) | AnkiError::Cancelled) | None => 1,
    }
}

/// Follow-up suggestion shown under an error, if there is one.
pub fn hint_for(err: &anyhow::Error) -> Option<String> {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.hint().map(str::to_string);
    }
    match err.downcast_ref::<AnkiError>()? {
        AnkiError::NotFound { segment, path } if path.starts_with('/') => {
            let parent = path
                .strip_suffix(segment.as_str())
                .and_then(|p| p.strip_suffix('/'))
                .filter(|p| !p.is_empty())
                .unwrap_or(path);
            Some(format!("run `ankiterm list {}` to see what exists", parent))
        }
        AnkiError::Ambiguous { .. } => Some("refer to the model by its numeric ID".to_string()),
        AnkiError::Integrity(_) => Some("nothing was changed".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::exit_codes;

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let err = anyhow::Error::new(AnkiError::NotFound {
            segment: "Nonexistent".to_string(),
            path: "/models/Basic/fields/Nonexistent".to_string(),
        });
        assert_eq!(exit_code_for(&err), exit_codes::NOT_FOUND);

        let err = anyhow::Error::new(AnkiError::Validation("bad".to_string()));
        assert_eq!(exit_code_for(&err), exit_codes::INVALID_INPUT);

        let err = anyhow::Error::new(AnkiError::Integrity("broken".to_string()));
        assert_eq!(exit_code_for(&err), exit_codes::INTEGRITY_FAILED);
    }

    #[test]
    fn test_cli_error_exit_code() {
        let err = anyhow::Error::new(CliError::not_found("missing", "pass --apkg"));
        assert_eq!(exit_code_for(&err), exit_codes::NOT_FOUND);
    }

    #[test]
    fn test_not_found_hint_names_parent() {
        let err = anyhow::Error::new(AnkiError::NotFound {
            segment: "Nonexistent".to_string(),
            path: "/models/Basic/fields/Nonexistent".to_string(),
        });
        assert_eq!(
            hint_for(&err).as_deref(),
            Some("run `ankiterm list /models/Basic/fields` to see what exists")
        );
    }

    #[test]
    fn test_not_found_hint_for_container_path() {
        let err = anyhow::Error::new(AnkiError::NotFound {
            segment: "Missing".to_string(),
            path: "/models".to_string(),
        });
        assert_eq!(
            hint_for(&err).as_deref(),
            Some("run `ankiterm list /models` to see what exists")
        );
    }

    #[test]
    fn test_unclassified_error_is_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
    }
}
