use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Division;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    pub season: Option<String>,
    pub division: Option<Division>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Draft,
    Sent,
    PartiallySigned,
    Executed,
    Cancelled,
    Expired,
}

impl ContractStatus {
    /// Contracts that still expect signatures.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ContractStatus::Draft | ContractStatus::Sent | ContractStatus::PartiallySigned
        )
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStatus::Draft => write!(f, "Draft"),
            ContractStatus::Sent => write!(f, "Sent"),
            ContractStatus::PartiallySigned => write!(f, "Partially signed"),
            ContractStatus::Executed => write!(f, "Executed"),
            ContractStatus::Cancelled => write!(f, "Cancelled"),
            ContractStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signer {
    Parent,
    Student,
    Director,
}

impl Signer {
    pub const ALL: [Signer; 3] = [Signer::Parent, Signer::Student, Signer::Director];

    /// Column holding the signature timestamp.
    pub fn date_column(&self) -> &'static str {
        match self {
            Signer::Parent => "parent_signature_date",
            Signer::Student => "student_signature_date",
            Signer::Director => "director_signature_date",
        }
    }

    /// Column holding the signature image.
    pub fn image_column(&self) -> &'static str {
        match self {
            Signer::Parent => "parent_signature",
            Signer::Student => "student_signature",
            Signer::Director => "director_signature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Signer::Parent => "parent",
            Signer::Student => "student",
            Signer::Director => "director",
        }
    }
}

impl std::fmt::Display for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub contract_number: String,
    pub student_id: String,
    pub template_id: Option<String>,
    pub season: String,
    pub monthly_tuition: f64,
    pub registration_fee: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: ContractStatus,
    pub parent_signature_date: Option<DateTime<Utc>>,
    pub student_signature_date: Option<DateTime<Utc>>,
    pub director_signature_date: Option<DateTime<Utc>>,
    pub parent_signature: Option<String>,
    pub student_signature: Option<String>,
    pub director_signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    pub fn signature_date(&self, signer: Signer) -> Option<DateTime<Utc>> {
        match signer {
            Signer::Parent => self.parent_signature_date,
            Signer::Student => self.student_signature_date,
            Signer::Director => self.director_signature_date,
        }
    }

    /// Signers whose signature this contract needs.
    /// The student signs only when recorded as of signing age.
    pub fn required_signers(student_signs: bool) -> Vec<Signer> {
        Signer::ALL
            .into_iter()
            .filter(|s| *s != Signer::Student || student_signs)
            .collect()
    }

    /// Required signers that have not signed yet, in parent/student/director order.
    pub fn missing_signatures(&self, student_signs: bool) -> Vec<Signer> {
        Self::required_signers(student_signs)
            .into_iter()
            .filter(|s| self.signature_date(*s).is_none())
            .collect()
    }

    pub fn is_fully_executed(&self, student_signs: bool) -> bool {
        self.missing_signatures(student_signs).is_empty()
    }

    /// Status implied by the current signatures.
    pub fn status_from_signatures(&self, student_signs: bool) -> ContractStatus {
        if !self.status.is_open() {
            return self.status;
        }
        let any_signed = Signer::ALL
            .iter()
            .any(|s| self.signature_date(*s).is_some());
        if self.is_fully_executed(student_signs) {
            ContractStatus::Executed
        } else if any_signed {
            ContractStatus::PartiallySigned
        } else {
            self.status
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewContract {
    pub contract_number: String,
    pub student_id: String,
    pub template_id: Option<String>,
    pub season: String,
    pub monthly_tuition: f64,
    pub registration_fee: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContractStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract(parent: bool, student: bool, director: bool) -> Contract {
        let ts = |set: bool| if set { json!("2026-09-01T12:00:00Z") } else { json!(null) };
        serde_json::from_value(json!({
            "id": "c1",
            "contract_number": "C-2026-0001",
            "student_id": "s1",
            "template_id": "t1",
            "season": "2026-2027",
            "monthly_tuition": 450.0,
            "registration_fee": 100.0,
            "start_date": "2026-09-01",
            "end_date": "2027-09-01",
            "status": "sent",
            "parent_signature_date": ts(parent),
            "student_signature_date": ts(student),
            "director_signature_date": ts(director),
            "created_at": "2026-09-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_fully_executed_minor_needs_parent_and_director() {
        assert!(contract(true, false, true).is_fully_executed(false));
        assert!(!contract(true, false, false).is_fully_executed(false));
        assert!(!contract(false, false, true).is_fully_executed(false));
    }

    #[test]
    fn test_fully_executed_adult_needs_all_three() {
        assert!(!contract(true, false, true).is_fully_executed(true));
        assert!(contract(true, true, true).is_fully_executed(true));
    }

    #[test]
    fn test_every_combination() {
        for mask in 0..8u8 {
            let (p, s, d) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
            let c = contract(p, s, d);
            assert_eq!(c.is_fully_executed(false), p && d, "minor mask {mask}");
            assert_eq!(c.is_fully_executed(true), p && s && d, "adult mask {mask}");
        }
    }

    #[test]
    fn test_missing_signatures_order() {
        let c = contract(false, false, false);
        assert_eq!(
            c.missing_signatures(true),
            vec![Signer::Parent, Signer::Student, Signer::Director]
        );
        assert_eq!(
            c.missing_signatures(false),
            vec![Signer::Parent, Signer::Director]
        );
    }

    #[test]
    fn test_status_from_signatures() {
        assert_eq!(
            contract(false, false, false).status_from_signatures(false),
            ContractStatus::Sent
        );
        assert_eq!(
            contract(true, false, false).status_from_signatures(false),
            ContractStatus::PartiallySigned
        );
        assert_eq!(
            contract(true, false, true).status_from_signatures(false),
            ContractStatus::Executed
        );
        let mut cancelled = contract(true, false, true);
        cancelled.status = ContractStatus::Cancelled;
        assert_eq!(
            cancelled.status_from_signatures(false),
            ContractStatus::Cancelled
        );
    }
}
