use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::importer::ImportSummary;

/// Short description of one matched element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySample {
    pub index: usize,
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamAnalysis {
    pub success: bool,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub content_length: usize,
    pub content_length_human: String,
    pub xml_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_tag: Option<String>,
    pub element: String,
    pub element_count: usize,
    pub sample: Vec<EntrySample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedDebug {
    pub success: bool,
    pub source: String,
    pub auth_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub raw_length: usize,
    pub stripped_length: usize,
    pub is_empty: bool,
    pub mostly_whitespace: bool,
    pub looks_like_error_page: bool,
    pub xml_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    pub raw_content: String,
    pub raw_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty_content: Option<String>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt: u32,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub content_length: usize,
    pub xml_valid: bool,
    pub element_count: usize,
    pub import_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_result: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggressiveCheck {
    pub success: bool,
    pub source: String,
    pub element: String,
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub found_on_attempt: Option<u32>,
    pub import_triggered: bool,
    pub attempts: Vec<AttemptResult>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    pub element_count: usize,
}

/// Tag names below the root, for eyeballing a document's shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureDump {
    pub root_tag: String,
    pub root_children: Vec<String>,
    pub first_element_children: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PastedImport {
    pub success: bool,
    pub xml_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_tag: Option<String>,
    pub element: String,
    pub element_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<StructureDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_result: Option<ImportSummary>,
    pub message: String,
}
