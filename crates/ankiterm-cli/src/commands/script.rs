use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use ankiterm_core::ops;
use ankiterm_core::Operation;

use super::save_if_needed;
use crate::app::AppContext;
use crate::cli::RunArgs;
use crate::errors::CliError;
use crate::output::{batch_json, print_report};
use crate::ui::{blank_line, header, kv, print};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptStep {
    op: String,
    #[serde(default)]
    args: Value,
}

fn read_script(path: &Path) -> anyhow::Result<Vec<ScriptStep>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CliError::invalid_input(format!("Failed to read script {}: {}", path.display(), e))
    })?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&contents).map_err(|e| {
        CliError::invalid_input(format!("Invalid script {}: {}", path.display(), e))
    })?;
    if steps.is_empty() {
        return Err(CliError::invalid_input(format!("{} has no steps", path.display())).into());
    }
    Ok(steps)
}

pub fn handle_run(ctx: &AppContext, args: &RunArgs) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let steps = read_script(&args.script)?;
    let operations = steps
        .into_iter()
        .map(|step| {
            let args = if step.args.is_null() {
                Value::Object(Default::default())
            } else {
                step.args
            };
            ops::from_json(&step.op, args)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&dyn Operation> = operations.iter().map(|op| op.as_ref()).collect();

    let mut session = ctx.open_session()?;
    let reports = session.apply_batch(&refs)?;
    let saved = save_if_needed(ctx, &mut session)?;

    if ui.mode.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&batch_json(&reports, saved.as_ref())?)?
        );
        return Ok(());
    }

    if !ctx.quiet() {
        print(&ui, &header(&ui, "run", Some(&session.path().display().to_string())));
        print(&ui, &kv(&ui, "Steps", &reports.len().to_string()));
    }
    let last = reports.len().saturating_sub(1);
    for (i, report) in reports.iter().enumerate() {
        blank_line(&ui);
        // The save belongs to the whole batch, so it goes with the last step.
        let step_saved = if i == last { saved.as_ref() } else { None };
        print_report(&ui, report, step_saved, ctx.quiet());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(
            &path,
            r#"[{"op": "add-field", "args": {"model": "Basic", "field": "Notes"}}, {"op": "info"}]"#,
        )
        .unwrap();
        let steps = read_script(&path).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].op, "add-field");
        assert!(steps[1].args.is_null());
    }

    #[test]
    fn test_empty_script_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(read_script(&path).is_err());
    }

    #[test]
    fn test_unknown_step_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{"op": "add-field", "arguments": {}}]"#).unwrap();
        assert!(read_script(&path).is_err());
    }
}
