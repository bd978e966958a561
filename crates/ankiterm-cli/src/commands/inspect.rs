use ankiterm_core::ops::{CountOp, GetOp, ListOp};

use crate::app::AppContext;
use crate::cli::{CountArgs, GetArgs, ListArgs};
use crate::output::print_listing;
use crate::ui::{header, kv, print};

pub fn handle_info(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let session = ctx.open_session()?;
    let report = session.info()?;

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&report.data)?);
        return Ok(());
    }
    if !ctx.quiet() {
        print(&ui, &header(&ui, "info", Some(&session.path().display().to_string())));
    }
    print_listing(&ui, &report);
    Ok(())
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let session = ctx.open_session()?;
    let mut op = ListOp::new(&args.path)?;
    op.limit = args.limit;
    let report = session.query(&op)?;

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&report.data)?);
        return Ok(());
    }
    if !ctx.quiet() {
        print(&ui, &header(&ui, &format!("list {}", op.path), None));
    }
    print_listing(&ui, &report);
    Ok(())
}

pub fn handle_get(ctx: &AppContext, args: &GetArgs) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let session = ctx.open_session()?;
    let op = GetOp::new(&args.path)?;
    let report = session.query(&op)?;

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&report.data)?);
        return Ok(());
    }
    if !ctx.quiet() {
        print(&ui, &header(&ui, &format!("get {}", op.path), None));
    }
    print_listing(&ui, &report);
    Ok(())
}

pub fn handle_count(ctx: &AppContext, args: &CountArgs) -> anyhow::Result<()> {
    let ui = ctx.ui()?;
    let session = ctx.open_session()?;
    let op = CountOp::new(&args.path)?;
    let report = session.query(&op)?;

    if ui.mode.is_json() {
        println!("{}", serde_json::to_string_pretty(&report.data)?);
        return Ok(());
    }
    let count = report
        .data
        .as_ref()
        .and_then(|d| d.get("count"))
        .and_then(|c| c.as_u64())
        .unwrap_or(0);
    if ctx.quiet() {
        println!("{}", count);
    } else if ui.mode.is_pretty() {
        print(&ui, &report.message);
    } else {
        print(&ui, &kv(&ui, "Path", &op.path.to_string()));
        print(&ui, &kv(&ui, "Count", &count.to_string()));
    }
    Ok(())
}
