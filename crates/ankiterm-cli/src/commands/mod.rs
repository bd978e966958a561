//! Command handlers, one module per command group.

mod inspect;
mod misc;
mod notes;
mod populate;
mod script;
mod structure;

pub use inspect::{handle_count, handle_get, handle_info, handle_list};
pub use misc::handle_completions;
pub use notes::{
    handle_divide_decks, handle_migrate_notes, handle_remove_empty_notes, handle_tag_notes,
};
pub use populate::{handle_populate_fields, handle_populators};
pub use script::handle_run;
pub use structure::{
    handle_add_field, handle_add_model, handle_add_template, handle_remove_field,
    handle_rename_field, handle_rename_model,
};

use ankiterm_core::{Operation, OperationReport, SaveSummary, Session};

use crate::app::AppContext;
use crate::output::{print_report, report_json};
use crate::ui::{header, print, UiContext};

/// Save when the invocation changed something, or when `--output` asks for a copy.
fn save_if_needed(ctx: &AppContext, session: &mut Session) -> anyhow::Result<Option<SaveSummary>> {
    if session.is_modified() || ctx.cli().output.is_some() {
        Ok(Some(ctx.save(session)?))
    } else {
        Ok(None)
    }
}

fn print_write_result(
    ctx: &AppContext,
    ui: &UiContext,
    session: &Session,
    report: &OperationReport,
    saved: Option<&SaveSummary>,
) -> anyhow::Result<()> {
    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&report_json(report, saved)?)?);
        return Ok(());
    }
    if !ctx.quiet() {
        print(ui, &header(ui, &report.operation, Some(&session.path().display().to_string())));
    }
    print_report(ui, report, saved, ctx.quiet());
    Ok(())
}

/// Open the archive, apply one write operation, save and report.
fn run_operation(ctx: &AppContext, operation: &dyn Operation) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let mut session = ctx.open_session()?;
    let report = session.apply(operation)?;
    let saved = save_if_needed(ctx, &mut session)?;
    print_write_result(ctx, &ui, &session, &report, saved.as_ref())
}
