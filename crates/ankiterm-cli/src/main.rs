//! ankiterm - inspect and restructure Anki collection archives
//!
//! Command-line front end for `ankiterm-core`. Each invocation opens one
//! archive, applies the requested operation and saves atomically.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;
mod ui;

use clap::{CommandFactory, Parser};
use log::LevelFilter;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::errors::{exit_code_for, hint_for};
use crate::ui::{print_error, UiContext};

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        2 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.format_timestamp(None).init();
}

fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let Some(command) = &ctx.cli().command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Info => commands::handle_info(ctx),
        Commands::List(args) => commands::handle_list(ctx, args),
        Commands::Get(args) => commands::handle_get(ctx, args),
        Commands::Count(args) => commands::handle_count(ctx, args),
        Commands::RenameField(args) => commands::handle_rename_field(ctx, args),
        Commands::RenameModel(args) => commands::handle_rename_model(ctx, args),
        Commands::MigrateNotes(args) => commands::handle_migrate_notes(ctx, args),
        Commands::AddModel(args) => commands::handle_add_model(ctx, args),
        Commands::AddField(args) => commands::handle_add_field(ctx, args),
        Commands::RemoveField(args) => commands::handle_remove_field(ctx, args),
        Commands::AddTemplate(args) => commands::handle_add_template(ctx, args),
        Commands::TagNotes(args) => commands::handle_tag_notes(ctx, args),
        Commands::RemoveEmptyNotes(args) => commands::handle_remove_empty_notes(ctx, args),
        Commands::DivideDecks(args) => commands::handle_divide_decks(ctx, args),
        Commands::PopulateFields(args) => commands::handle_populate_fields(ctx, args),
        Commands::Populators => commands::handle_populators(ctx),
        Commands::Run(args) => commands::handle_run(ctx, args),
        Commands::Completions(args) => commands::handle_completions(args.shell),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = AppContext::new(&cli);
    if let Err(err) = run(&ctx) {
        // Built from flags alone: the config file may be what failed.
        let ui = UiContext::from_env(cli.json, cli.format, cli.no_color, cli.ascii);
        print_error(&ui, &format!("{:#}", err), hint_for(&err).as_deref());
        std::process::exit(exit_code_for(&err));
    }
}
