//! Text and table output for operation results.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use ankiterm_core::{OperationReport, SaveSummary};

use crate::ui::format::{display_value, single_line, truncate};
use crate::ui::{blank_line, hint, kv, print, receipt, simple_table, table, Badge, Column, UiContext};

/// Changes listed individually before collapsing into a count.
const MAX_LISTED_CHANGES: usize = 20;

/// "Sort_field" style keys as "Sort field".
fn title(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cell(ui: &UiContext, value: &Value) -> String {
    truncate(&single_line(&display_value(value)), ui.cell_width())
}

fn object_table(ui: &UiContext, items: &[Value]) -> String {
    let keys: Vec<&String> = match items.first() {
        Some(Value::Object(first)) => first.keys().collect(),
        _ => Vec::new(),
    };
    let columns: Vec<Column> = keys.iter().map(|k| Column::new(title(k))).collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            keys.iter()
                .map(|k| item.get(k.as_str()).map_or_else(String::new, |v| cell(ui, v)))
                .collect()
        })
        .collect();
    table(ui, &columns, &rows)
}

fn print_value(ui: &UiContext, key: &str, value: &Value) {
    match value {
        Value::String(text) if ui.mode.is_pretty() && text.contains('\n') => {
            print(ui, &kv(ui, &title(key), ""));
            for line in text.lines() {
                print(ui, &format!("  {}", line));
            }
        }
        _ => print(ui, &kv(ui, &title(key), &single_line(&display_value(value)))),
    }
}

fn print_object(ui: &UiContext, map: &Map<String, Value>) {
    let mut tables = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
                tables.push((key, items));
            }
            Value::Object(inner) if !inner.is_empty() && ui.mode.is_pretty() => {
                print(ui, &kv(ui, &title(key), ""));
                for (k, v) in inner {
                    print(ui, &format!("  {}", kv(ui, &title(k), &single_line(&display_value(v)))));
                }
            }
            _ => print_value(ui, key, value),
        }
    }
    for (key, items) in tables {
        blank_line(ui);
        if ui.mode.is_pretty() {
            print(ui, &title(key));
        }
        print(ui, &object_table(ui, items));
    }
}

/// Render the data of a read operation: scalars as key/value lines,
/// lists of objects as tables.
pub fn print_listing(ui: &UiContext, report: &OperationReport) {
    match &report.data {
        Some(Value::Object(map)) => print_object(ui, map),
        Some(other) => print(ui, &display_value(other)),
        None => {}
    }
    blank_line(ui);
    if ui.mode.is_pretty() {
        print(ui, &report.message);
    }
}

fn change_summary(report: &OperationReport) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for change in &report.changes {
        *counts.entry(change.kind.label()).or_default() += 1;
    }
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .into_iter()
        .map(|(kind, n)| format!("{} {}", n, kind))
        .collect::<Vec<_>>()
        .join(", ")
}

fn receipt_items(report: &OperationReport, saved: Option<&SaveSummary>) -> Vec<(&'static str, String)> {
    let mut items = vec![("Changes", change_summary(report))];
    if !report.failures.is_empty() {
        items.push(("Failed", report.failures.len().to_string()));
    }
    if !report.skipped.is_empty() {
        items.push(("Skipped", report.skipped.len().to_string()));
    }
    if let Some(saved) = saved {
        let value = if saved.written {
            saved.path.display().to_string()
        } else {
            "nothing to write".to_string()
        };
        items.push(("Saved", value));
    }
    items
}

/// Receipt for a write operation, followed by its failures and changes.
pub fn print_report(ui: &UiContext, report: &OperationReport, saved: Option<&SaveSummary>, quiet: bool) {
    let partial = !report.failures.is_empty() || !report.skipped.is_empty();
    let kind = if partial { Badge::Warn } else { Badge::Ok };
    let message = if report.message.is_empty() {
        report.operation.as_str()
    } else {
        report.message.as_str()
    };
    print(ui, &receipt(ui, kind, message, &receipt_items(report, saved)));

    if !report.failures.is_empty() {
        blank_line(ui);
        let rows: Vec<Vec<String>> = report
            .failures
            .iter()
            .map(|f| vec![f.note_id.to_string(), truncate(&single_line(&f.reason), 100)])
            .collect();
        print(ui, &simple_table(ui, &[Column::new("Note"), Column::new("Reason")], &rows));
    }

    if quiet || !ui.mode.is_pretty() || report.changes.is_empty() {
        return;
    }
    blank_line(ui);
    let rows: Vec<Vec<String>> = report
        .changes
        .iter()
        .take(MAX_LISTED_CHANGES)
        .map(|c| vec![c.kind.label().to_string(), c.entity.clone()])
        .collect();
    print(ui, &simple_table(ui, &[Column::new("Change"), Column::new("Entity")], &rows));
    if report.changes.len() > MAX_LISTED_CHANGES {
        print(
            ui,
            &hint(
                ui,
                &format!(
                    "{} more; use --json for the full list",
                    report.changes.len() - MAX_LISTED_CHANGES
                ),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ankiterm_core::ops::ChangeKind;

    #[test]
    fn test_title() {
        assert_eq!(title("sort_field"), "Sort field");
        assert_eq!(title("notes"), "Notes");
        assert_eq!(title(""), "");
    }

    #[test]
    fn test_change_summary_groups_by_kind() {
        let mut report = OperationReport::new("remove-field");
        report.record(ChangeKind::Modified, "/notes/10");
        report.record(ChangeKind::Modified, "/notes/11");
        report.record(ChangeKind::Removed, "/models/Basic/fields/Back");
        assert_eq!(change_summary(&report), "2 modified, 1 removed");
        assert_eq!(change_summary(&OperationReport::new("x")), "none");
    }

    #[test]
    fn test_receipt_items_for_partial_populate() {
        let mut report = OperationReport::new("populate-fields");
        report.record(ChangeKind::Modified, "/notes/1");
        report.fail(2, "timed out");
        report.skipped.push(3);
        let items = receipt_items(&report, None);
        let keys: Vec<&str> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["Changes", "Failed", "Skipped"]);
    }
}
