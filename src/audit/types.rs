use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::configuration::types::ImportType;
use crate::importer::ImportSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ImportStatus { Success, Failed, Partial }

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self { ImportStatus::Success => "Success", ImportStatus::Failed => "Failed", ImportStatus::Partial => "Partial" }
    }

    /// Failed when the run aborted or nothing got through; Partial when some elements failed.
    pub fn of(summary: &ImportSummary) -> Self {
        let done = summary.imported + summary.updated + summary.skipped;
        match (summary.success, summary.errors) {
            (false, _) => ImportStatus::Failed,
            (true, 0) => ImportStatus::Success,
            (true, _) if done > 0 => ImportStatus::Partial,
            (true, _) => ImportStatus::Failed,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Source label for operator-supplied documents.
pub const PASTED_SOURCE: &str = "pasted content";

#[derive(Debug, Clone, Serialize)]
pub struct NewLogEntry {
    pub import_type: ImportType,
    pub config_id: Option<i32>,
    pub xml_source: String,
    pub status: ImportStatus,
    pub records_imported: i32,
    pub records_updated: i32,
    pub error_count: i32,
    pub error_message: String,
    pub summary: Value,
}

impl NewLogEntry {
    pub fn from_summary(import_type: ImportType, config_id: Option<i32>, xml_source: &str, summary: &ImportSummary) -> Self {
        let mut errors = summary.error_messages.clone();
        if let Some(e) = &summary.error { errors.insert(0, e.clone()); }
        NewLogEntry {
            import_type,
            config_id,
            xml_source: xml_source.to_string(),
            status: ImportStatus::of(summary),
            records_imported: summary.imported as i32,
            records_updated: summary.updated as i32,
            error_count: summary.errors as i32,
            error_message: errors.join("\n"),
            summary: serde_json::to_value(summary).unwrap_or(Value::Null),
        }
    }

    pub fn total_processed(&self) -> i32 { self.records_imported + self.records_updated }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImportLogEntry {
    pub log_id: i64,
    pub import_datetime: DateTime<Utc>,
    pub import_type: String,
    pub config_id: Option<i32>,
    pub xml_source: String,
    pub status: String,
    pub records_imported: i32,
    pub records_updated: i32,
    pub error_count: i32,
    pub total_processed: i32,
    pub error_message: String,
    pub summary: Value,
}

#[derive(Serialize)]
pub struct LogList {
    pub entries: Vec<ImportLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_summary() {
        let ok = ImportSummary { success: true, imported: 2, ..Default::default() };
        assert_eq!(ImportStatus::of(&ok), ImportStatus::Success);

        let partial = ImportSummary { success: true, imported: 2, errors: 1, ..Default::default() };
        assert_eq!(ImportStatus::of(&partial), ImportStatus::Partial);

        let all_bad = ImportSummary { success: true, errors: 3, ..Default::default() };
        assert_eq!(ImportStatus::of(&all_bad), ImportStatus::Failed);

        assert_eq!(ImportStatus::of(&ImportSummary::failed("boom")), ImportStatus::Failed);
    }

    #[test]
    fn entry_totals_and_error_text() {
        let summary = ImportSummary {
            success: true,
            imported: 3,
            updated: 4,
            errors: 1,
            error_messages: vec!["Failed to process item X: nope".into()],
            ..Default::default()
        };
        let e = NewLogEntry::from_summary(ImportType::Items, Some(1), "https://shop.example/feed.xml", &summary);
        assert_eq!(e.total_processed(), 7);
        assert_eq!(e.status, ImportStatus::Partial);
        assert_eq!(e.error_message, "Failed to process item X: nope");
        assert_eq!(e.summary["imported"], 3);

        let failed = NewLogEntry::from_summary(ImportType::Orders, None, PASTED_SOURCE, &ImportSummary::failed("XML parsing failed: x"));
        assert_eq!(failed.error_message, "XML parsing failed: x");
        assert_eq!(failed.status, ImportStatus::Failed);
    }
}
