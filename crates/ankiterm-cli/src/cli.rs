use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

use ankiterm_core::VERSION;

use crate::ui::Format;

/// ankiterm - Inspect and restructure Anki collection archives from the terminal
#[derive(Parser)]
#[command(name = "ankiterm")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the .apkg archive
    #[arg(short, long, global = true, env = "ANKITERM_APKG", value_name = "PATH")]
    pub apkg: Option<PathBuf>,

    /// Write changes here instead of rewriting the input archive
    #[arg(short, long, global = true, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing --output file
    #[arg(long, global = true)]
    pub force: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format
    #[arg(long, global = true, value_enum)]
    pub format: Option<Format>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Address to list, e.g. /models/Basic/fields
    #[arg(value_name = "PATH", default_value = "/models")]
    pub path: String,

    /// Show at most this many items
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments for the `get` command
#[derive(Args)]
pub struct GetArgs {
    /// Address of one object, e.g. /models/Basic/css
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Arguments for the `count` command
#[derive(Args)]
pub struct CountArgs {
    /// Address to count, e.g. /notes/Basic
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Arguments for the `rename-field` command
#[derive(Args)]
pub struct RenameFieldArgs {
    /// Model name or ID
    #[arg(value_name = "MODEL")]
    pub model: String,

    /// Current field name
    #[arg(value_name = "OLD")]
    pub old: String,

    /// New field name
    #[arg(value_name = "NEW")]
    pub new: String,
}

/// Arguments for the `rename-model` command
#[derive(Args)]
pub struct RenameModelArgs {
    /// Model name or ID
    #[arg(value_name = "MODEL")]
    pub model: String,

    /// New model name
    #[arg(value_name = "NEW")]
    pub new_name: String,
}

/// Arguments for the `migrate-notes` command
#[derive(Args)]
pub struct MigrateNotesArgs {
    /// Model whose notes move
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Model the notes move to
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Field mapping SOURCE_FIELD=TARGET_FIELD (repeatable)
    #[arg(short, long = "map", value_name = "SRC=DST", required = true)]
    pub mapping: Vec<String>,

    /// Template mapping SOURCE_TEMPLATE=TARGET_TEMPLATE (repeatable)
    #[arg(long, value_name = "SRC=DST")]
    pub template_map: Vec<String>,

    /// Send cards with no matching template to the first target template
    #[arg(long)]
    pub fallback_to_first: bool,
}

/// Arguments for the `add-model` command
#[derive(Args)]
pub struct AddModelArgs {
    /// Name of the new model
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Field name (repeatable, in order)
    #[arg(short, long = "field", value_name = "FIELD", required = true)]
    pub fields: Vec<String>,

    /// Template NAME:QFMT:AFMT (repeatable)
    #[arg(short, long = "template", value_name = "NAME:QFMT:AFMT")]
    pub templates: Vec<String>,

    /// Stylesheet for the model
    #[arg(long)]
    pub css: Option<String>,

    /// Create a cloze model
    #[arg(long)]
    pub cloze: bool,
}

/// Arguments for the `add-field` command
#[derive(Args)]
pub struct AddFieldArgs {
    /// Model name or ID
    #[arg(value_name = "MODEL")]
    pub model: String,

    /// Name of the new field
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Zero-based position (default: append)
    #[arg(long)]
    pub position: Option<usize>,

    /// Value given to every existing note
    #[arg(long, default_value = "")]
    pub default: String,
}

/// Arguments for the `remove-field` command
#[derive(Args)]
pub struct RemoveFieldArgs {
    /// Model name or ID
    #[arg(value_name = "MODEL")]
    pub model: String,

    /// Field to remove
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Also delete {{FIELD}} references from templates
    #[arg(long)]
    pub strip_references: bool,
}

/// Arguments for the `add-template` command
#[derive(Args)]
pub struct AddTemplateArgs {
    /// Model name or ID
    #[arg(value_name = "MODEL")]
    pub model: String,

    /// Template name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Question format
    #[arg(long)]
    pub qfmt: String,

    /// Answer format
    #[arg(long)]
    pub afmt: String,
}

/// Arguments for the `tag-notes` command
#[derive(Args)]
pub struct TagNotesArgs {
    /// Field whose value is searched
    #[arg(value_name = "FIELD")]
    pub field: String,

    /// Regular expression, matched anywhere in the field
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Tag to add to matching notes
    #[arg(value_name = "TAG")]
    pub tag: String,

    /// Model name or ID (optional when the collection has one model)
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for the `remove-empty-notes` command
#[derive(Args)]
pub struct RemoveEmptyNotesArgs {
    /// Model name or ID (optional when the collection has one model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Only these fields must be empty (repeatable; default: all)
    #[arg(short, long = "field", value_name = "FIELD")]
    pub fields: Vec<String>,
}

/// Arguments for the `divide-decks` command
#[derive(Args)]
pub struct DivideDecksArgs {
    /// Deck whose cards are divided (name or ID)
    #[arg(value_name = "DECK")]
    pub source_deck: String,

    /// Only tags starting with PREFIX_ are read
    #[arg(long, value_name = "PREFIX")]
    pub tag_prefix: String,

    /// Regular expression whose first group is the episode number
    #[arg(long, value_name = "REGEX")]
    pub tag_pattern: String,

    /// Episodes per target deck
    #[arg(long, value_name = "N")]
    pub episodes_per_deck: u32,

    /// Name prefix for target decks (default: the source deck's name)
    #[arg(long, value_name = "PREFIX")]
    pub target_deck_prefix: Option<String>,
}

/// Arguments for the `populate-fields` command
#[derive(Args)]
pub struct PopulateFieldsArgs {
    /// Model whose notes are populated
    #[arg(short, long)]
    pub model: String,

    /// Populator name (see `ankiterm populators`)
    #[arg(short, long)]
    pub populator: String,

    /// JSON file with populator options
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Notes processed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-note time limit in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the `run` command
#[derive(Args)]
pub struct RunArgs {
    /// JSON script: [{"op": "...", "args": {...}}, ...]
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the collection
    Info,

    /// List what an address resolves to
    List(ListArgs),

    /// Show one object: model, field, template, css or example note
    Get(GetArgs),

    /// Count what an address resolves to
    Count(CountArgs),

    /// Rename a field and update template references
    RenameField(RenameFieldArgs),

    /// Rename a model
    RenameModel(RenameModelArgs),

    /// Move every note of one model to another
    MigrateNotes(MigrateNotesArgs),

    /// Create a new model
    AddModel(AddModelArgs),

    /// Add a field to a model
    AddField(AddFieldArgs),

    /// Remove a field from a model
    RemoveField(RemoveFieldArgs),

    /// Add a card template to a model
    AddTemplate(AddTemplateArgs),

    /// Tag notes whose field matches a pattern
    TagNotes(TagNotesArgs),

    /// Delete notes whose fields are empty
    RemoveEmptyNotes(RemoveEmptyNotesArgs),

    /// Split a deck into episode-range decks by note tags
    DivideDecks(DivideDecksArgs),

    /// Fill fields with a populator
    PopulateFields(PopulateFieldsArgs),

    /// List available populators
    Populators,

    /// Apply a script of operations as one unit
    Run(RunArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_notes() {
        let cli = Cli::try_parse_from([
            "ankiterm",
            "--apkg",
            "deck.apkg",
            "migrate-notes",
            "XYZ",
            "Target",
            "--map",
            "X=P",
            "-m",
            "Z=Q",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::MigrateNotes(args)) => {
                assert_eq!(args.source, "XYZ");
                assert_eq!(args.mapping, vec!["X=P", "Z=Q"]);
            }
            _ => panic!("expected migrate-notes"),
        }
    }

    #[test]
    fn test_parse_divide_decks() {
        let cli = Cli::try_parse_from([
            "ankiterm",
            "divide-decks",
            "Anime",
            "--tag-prefix",
            "show",
            "--tag-pattern",
            r"ep(\d+)",
            "--episodes-per-deck",
            "10",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::DivideDecks(args)) => {
                assert_eq!(args.source_deck, "Anime");
                assert_eq!(args.episodes_per_deck, 10);
                assert!(args.target_deck_prefix.is_none());
            }
            _ => panic!("expected divide-decks"),
        }
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::try_parse_from(["ankiterm", "-vv", "info"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
