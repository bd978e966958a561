//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (clap usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Archive, model, field or other addressed object not found.
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, bad path or failed validation.
    pub const INVALID_INPUT: i32 = 4;

    /// Archive or collection data could not be understood.
    pub const SCHEMA: i32 = 5;

    /// A mutation would have broken a collection invariant.
    pub const INTEGRITY_FAILED: i32 = 6;

    /// External annotation service failed.
    pub const EXTERNAL_SERVICE: i32 = 7;
}

/// Per-note time limit for populators, in seconds.
pub const DEFAULT_POPULATE_TIMEOUT_SECS: u64 = 30;

/// Notes in flight at once during populate-fields.
pub const DEFAULT_POPULATE_CONCURRENCY: usize = 4;

/// Upper bound for populate-fields concurrency.
pub const MAX_POPULATE_CONCURRENCY: usize = 8;

/// Default OpenAI model for the jap-llm populator.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the OpenAI API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
