use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStatus {
    #[default]
    Draft,
    Queued,
    Sent,
    Failed,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    pub id: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub student_id: Option<String>,
    pub template_id: Option<String>,
    #[serde(default)]
    pub status: CommunicationStatus,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCommunication {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub student_id: Option<String>,
    pub template_id: Option<String>,
    pub status: CommunicationStatus,
}

/// Reusable email body with `{{placeholder}}` tokens.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmailTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
}
