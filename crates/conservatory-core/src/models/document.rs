use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Sent,
    Signed,
    Archived,
}

impl DocumentStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::Sent)
    }
}

/// Rendered HTML snapshot of a generated contract.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub contract_id: Option<String>,
    pub student_id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub contract_id: Option<String>,
    pub student_id: Option<String>,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
}
