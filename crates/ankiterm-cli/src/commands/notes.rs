use ankiterm_core::ops::{DivideDecks, MigrateNotes, RemoveEmptyNotes, TagNotes};

use super::run_operation;
use crate::app::AppContext;
use crate::cli::{DivideDecksArgs, MigrateNotesArgs, RemoveEmptyNotesArgs, TagNotesArgs};
use crate::helpers::parse_pairs;

pub fn handle_migrate_notes(ctx: &AppContext, args: &MigrateNotesArgs) -> anyhow::Result<()> {
    let mapping = parse_pairs(&args.mapping, "--map")?;
    let mut op = MigrateNotes::new(&args.source, &args.target, mapping);
    op.template_map = parse_pairs(&args.template_map, "--template-map")?;
    op.fallback_to_first = args.fallback_to_first;
    run_operation(ctx, &op)
}

pub fn handle_tag_notes(ctx: &AppContext, args: &TagNotesArgs) -> anyhow::Result<()> {
    let op = TagNotes::new(
        args.model.clone(),
        &args.field,
        &args.pattern,
        &args.tag,
    );
    run_operation(ctx, &op)
}

pub fn handle_remove_empty_notes(
    ctx: &AppContext,
    args: &RemoveEmptyNotesArgs,
) -> anyhow::Result<()> {
    run_operation(
        ctx,
        &RemoveEmptyNotes::new(args.model.clone(), args.fields.clone()),
    )
}

pub fn handle_divide_decks(ctx: &AppContext, args: &DivideDecksArgs) -> anyhow::Result<()> {
    let mut op = DivideDecks::new(
        &args.source_deck,
        &args.tag_prefix,
        &args.tag_pattern,
        args.episodes_per_deck,
    );
    op.target_prefix = args.target_deck_prefix.clone();
    run_operation(ctx, &op)
}
