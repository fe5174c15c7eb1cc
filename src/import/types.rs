use serde::Serialize;

use crate::audit::types::ImportStatus;
use crate::configuration::types::ImportType;
use crate::importer::ImportSummary;

/// What `import` would do without `--apply`.
#[derive(Debug, Serialize)]
pub struct ImportPlan {
    pub config_id: i32,
    pub name: String,
    pub import_type: ImportType,
    pub source: String,
    pub company: Option<String>,
    pub auth: bool,
    /// Set when the run would be refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

/// Outcome of one configuration run, as returned to the CLI and the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ManualImport {
    pub success: bool,
    pub config_id: i32,
    pub name: String,
    pub import_type: ImportType,
    pub source: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ImportStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportSummary>,
}
