use std::time::Duration;

use serde_json::Value;

use ankiterm_core::ops::PopulateFields;
use ankiterm_core::populators::{self, BatchSettings, PopulatorConfig};

use super::save_if_needed;
use crate::app::AppContext;
use crate::cli::PopulateFieldsArgs;
use crate::config::PopulatorSection;
use crate::constants::MAX_POPULATE_CONCURRENCY;
use crate::helpers::read_populator_config;
use crate::output::{print_report, report_json};
use crate::ui::{header, print, simple_table, Column, Spinner};

/// Fill options the populator file leaves out from the config file.
fn with_config_defaults(
    name: &str,
    mut options: PopulatorConfig,
    section: &PopulatorSection,
) -> PopulatorConfig {
    if name == "jap-llm" {
        options
            .entry("model")
            .or_insert_with(|| Value::String(section.openai_model.clone()));
        options
            .entry("api_key_env")
            .or_insert_with(|| Value::String(section.api_key_env.clone()));
    }
    options
}

fn batch_settings(
    populator: &dyn populators::Populator,
    options: &PopulatorConfig,
    section: &PopulatorSection,
    args: &PopulateFieldsArgs,
) -> BatchSettings {
    let mut settings =
        BatchSettings::for_populator(populator, Duration::from_secs(section.timeout_secs.max(1)));
    if let Some(n) = args.concurrency {
        settings.concurrency = n.clamp(1, MAX_POPULATE_CONCURRENCY);
    } else if !options.contains_key("concurrency") {
        settings.concurrency = section.concurrency();
    }
    if let Some(secs) = args.timeout {
        settings.timeout = Duration::from_secs(secs.max(1));
    }
    settings
}

pub fn handle_populate_fields(ctx: &AppContext, args: &PopulateFieldsArgs) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let section = &ctx.config()?.populators;

    let options = match &args.config {
        Some(path) => read_populator_config(path)?,
        None => PopulatorConfig::new(),
    };
    let options = with_config_defaults(&args.populator, options, section);
    let populator = populators::create(&args.populator, &options)?;
    let settings = batch_settings(populator.as_ref(), &options, section, args);

    let mut session = ctx.open_session()?;
    let mut op = PopulateFields::new(&args.model, populator).with_settings(settings);
    op.listen_for_interrupt = true;

    if !ctx.quiet() && !ui.mode.is_json() {
        print(&ui, &header(&ui, "populate-fields", Some(&session.path().display().to_string())));
    }
    let spinner = Spinner::new(
        &ui,
        &format!("Running {} on {}", args.populator, args.model),
    );
    spinner.start();
    let report = match session.apply(&op) {
        Ok(report) => report,
        Err(e) => {
            spinner.abandon();
            return Err(e.into());
        }
    };
    if op.cancel.is_cancelled() {
        spinner.finish_warn("Interrupted; saving what finished");
    } else {
        spinner.finish("Done");
    }

    let saved = save_if_needed(ctx, &mut session)?;
    if ui.mode.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&report_json(&report, saved.as_ref())?)?
        );
    } else {
        print_report(&ui, &report, saved.as_ref(), ctx.quiet());
    }
    Ok(())
}

pub fn handle_populators(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let registry = populators::registry();

    if ui.mode.is_json() {
        let items: Vec<_> = registry
            .iter()
            .map(|p| serde_json::json!({ "name": p.name, "description": p.description }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if !ctx.quiet() {
        print(&ui, &header(&ui, "populators", None));
    }
    let rows: Vec<Vec<String>> = registry
        .iter()
        .map(|p| vec![p.name.to_string(), p.description.to_string()])
        .collect();
    print(
        &ui,
        &simple_table(&ui, &[Column::new("Name"), Column::new("Description")], &rows),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_llm_options_take_config_defaults() {
        let section = PopulatorSection::default();
        let options = json!({"source_field": "Front", "model": "gpt-4o"})
            .as_object()
            .cloned()
            .unwrap();
        let merged = with_config_defaults("jap-llm", options, &section);
        assert_eq!(merged["model"], "gpt-4o");
        assert_eq!(merged["api_key_env"], "OPENAI_API_KEY");
    }

    #[test]
    fn test_local_populator_options_untouched() {
        let section = PopulatorSection::default();
        let merged = with_config_defaults("copy-field", PopulatorConfig::new(), &section);
        assert!(merged.is_empty());
    }
}
