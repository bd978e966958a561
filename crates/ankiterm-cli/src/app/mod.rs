//! Application-level utilities for the ankiterm CLI.
//!
//! - Path resolution for the config file and the archive
//! - The per-invocation context handed to every command

mod context;
mod resolver;

pub use context::AppContext;
