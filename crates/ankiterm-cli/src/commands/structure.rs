use ankiterm_core::ops::{
    AddField, AddModel, AddTemplate, RemoveField, RenameField, RenameModel, TemplateSpec,
};

use super::run_operation;
use crate::app::AppContext;
use crate::cli::{
    AddFieldArgs, AddModelArgs, AddTemplateArgs, RemoveFieldArgs, RenameFieldArgs,
    RenameModelArgs,
};
use crate::helpers::parse_template;

pub fn handle_rename_field(ctx: &AppContext, args: &RenameFieldArgs) -> anyhow::Result<()> {
    run_operation(ctx, &RenameField::new(&args.model, &args.old, &args.new))
}

pub fn handle_rename_model(ctx: &AppContext, args: &RenameModelArgs) -> anyhow::Result<()> {
    run_operation(ctx, &RenameModel::new(&args.model, &args.new_name))
}

pub fn handle_add_model(ctx: &AppContext, args: &AddModelArgs) -> anyhow::Result<()> {
    let mut op = AddModel::new(&args.name, args.fields.clone());
    op.templates = args
        .templates
        .iter()
        .map(|t| parse_template(t))
        .collect::<anyhow::Result<Vec<TemplateSpec>>>()?;
    op.css = args.css.clone();
    op.cloze = args.cloze;
    run_operation(ctx, &op)
}

pub fn handle_add_field(ctx: &AppContext, args: &AddFieldArgs) -> anyhow::Result<()> {
    let mut op = AddField::new(&args.model, &args.field).with_default(&args.default);
    op.position = args.position;
    run_operation(ctx, &op)
}

pub fn handle_remove_field(ctx: &AppContext, args: &RemoveFieldArgs) -> anyhow::Result<()> {
    let mut op = RemoveField::new(&args.model, &args.field);
    op.strip_references = args.strip_references;
    run_operation(ctx, &op)
}

pub fn handle_add_template(ctx: &AppContext, args: &AddTemplateArgs) -> anyhow::Result<()> {
    let template = TemplateSpec::new(&args.name, &args.qfmt, &args.afmt);
    run_operation(ctx, &AddTemplate::new(&args.model, template))
}
