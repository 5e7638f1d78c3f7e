use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Division;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Overdue,
    Paid,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Overdue => write!(f, "Overdue"),
            PaymentStatus::Paid => write!(f, "Paid"),
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub id: String,
    pub contract_id: Option<String>,
    pub student_id: Option<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub amount: f64,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: PaymentStatus,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl PaymentSchedule {
    /// Overdue when marked so, or still pending after the due date.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        match self.status {
            PaymentStatus::Overdue => true,
            PaymentStatus::Pending => self.due_date < today,
            PaymentStatus::Paid => false,
        }
    }

    /// Whole days past due on `today`, never negative.
    pub fn days_overdue(&self, today: NaiveDate) -> u32 {
        u32::try_from((today - self.due_date).num_days().max(0)).unwrap_or(u32::MAX)
    }

    pub fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Payment due {}", self.due_date.format("%b %d, %Y")))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPaymentSchedule {
    pub contract_id: Option<String>,
    pub student_id: Option<String>,
    pub category_id: Option<String>,
    pub description: Option<String>,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCategory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentCategory {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuitionRate {
    pub id: String,
    pub division: Division,
    pub season: Option<String>,
    pub monthly_amount: f64,
    pub registration_fee: f64,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTuitionRate {
    pub division: Division,
    pub season: Option<String>,
    pub monthly_amount: f64,
    pub registration_fee: f64,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schedule(status: &str, due: &str) -> PaymentSchedule {
        serde_json::from_value(json!({
            "id": "p1",
            "contract_id": "c1",
            "student_id": "s1",
            "category_id": null,
            "description": null,
            "amount": 450,
            "due_date": due,
            "status": status,
            "paid_date": null,
            "created_at": "2026-08-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_pending_past_due_is_overdue() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(schedule("pending", "2026-10-01").is_overdue_on(today));
        assert!(!schedule("pending", "2026-10-19").is_overdue_on(today));
        assert!(schedule("overdue", "2026-11-01").is_overdue_on(today));
        assert!(!schedule("paid", "2026-01-01").is_overdue_on(today));
    }

    #[test]
    fn test_days_overdue_never_negative() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(schedule("pending", "2026-10-01").days_overdue(today), 18);
        assert_eq!(schedule("overdue", "2026-11-01").days_overdue(today), 0);
    }

    #[test]
    fn test_label_fallback() {
        assert_eq!(schedule("pending", "2026-10-01").label(), "Payment due Oct 01, 2026");
    }
}
