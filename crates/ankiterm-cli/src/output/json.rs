//! JSON output for operation results.

use serde_json::{json, Value};

use ankiterm_core::{OperationReport, SaveSummary};

fn saved_json(saved: &SaveSummary) -> Value {
    json!({
        "path": saved.path.display().to_string(),
        "written": saved.written,
        "rows": {
            "inserted": saved.stats.inserted,
            "updated": saved.stats.updated,
            "deleted": saved.stats.deleted,
        },
    })
}

/// One write operation and where its result was saved.
pub fn report_json(report: &OperationReport, saved: Option<&SaveSummary>) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(report)?;
    if let (Some(saved), Value::Object(map)) = (saved, &mut value) {
        map.insert("saved".to_string(), saved_json(saved));
    }
    Ok(value)
}

/// Every step of a script, plus the save.
pub fn batch_json(reports: &[OperationReport], saved: Option<&SaveSummary>) -> anyhow::Result<Value> {
    Ok(json!({
        "steps": serde_json::to_value(reports)?,
        "saved": saved.map(saved_json),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ankiterm_core::ops::ChangeKind;
    use ankiterm_core::storage::WriteStats;
    use std::path::PathBuf;

    fn summary() -> SaveSummary {
        SaveSummary {
            path: PathBuf::from("/tmp/out.apkg"),
            written: true,
            stats: WriteStats {
                updated: 2,
                ..WriteStats::default()
            },
        }
    }

    #[test]
    fn test_report_json_includes_save() {
        let mut report = OperationReport::new("rename-field").with_message("renamed");
        report.record(ChangeKind::Renamed, "/models/Basic/fields/Front");
        let value = report_json(&report, Some(&summary())).unwrap();

        assert_eq!(value["operation"], "rename-field");
        assert_eq!(value["changes"][0]["kind"], "renamed");
        assert_eq!(value["saved"]["path"], "/tmp/out.apkg");
        assert_eq!(value["saved"]["rows"]["updated"], 2);
    }

    #[test]
    fn test_batch_json_without_save() {
        let reports = vec![OperationReport::new("add-field"), OperationReport::new("tag-notes")];
        let value = batch_json(&reports, None).unwrap();
        assert_eq!(value["steps"].as_array().unwrap().len(), 2);
        assert!(value["saved"].is_null());
    }
}
