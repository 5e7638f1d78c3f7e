use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ContractGenerated,
    ContractSigned,
    StudentEnrolled,
    EmailSent,
    PaymentReminderSent,
    PaymentRecorded,
    TemplateImageUploaded,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ActivityKind::ContractGenerated => "Contract generated",
            ActivityKind::ContractSigned => "Contract signed",
            ActivityKind::StudentEnrolled => "Student enrolled",
            ActivityKind::EmailSent => "Email sent",
            ActivityKind::PaymentReminderSent => "Payment reminder",
            ActivityKind::PaymentRecorded => "Payment recorded",
            ActivityKind::TemplateImageUploaded => "Image uploaded",
        };
        write!(f, "{}", label)
    }
}

/// Append-only audit entry.
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub description: String,
    pub student_id: Option<String>,
    pub contract_id: Option<String>,
    pub communication_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub description: String,
    pub student_id: Option<String>,
    pub contract_id: Option<String>,
    pub communication_id: Option<String>,
    pub metadata: Value,
}

impl NewActivity {
    pub fn new(kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            student_id: None,
            contract_id: None,
            communication_id: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn student(mut self, id: &str) -> Self {
        self.student_id = Some(id.to_string());
        self
    }

    pub fn contract(mut self, id: &str) -> Self {
        self.contract_id = Some(id.to_string());
        self
    }

    pub fn communication(mut self, id: &str) -> Self {
        self.communication_id = Some(id.to_string());
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}
