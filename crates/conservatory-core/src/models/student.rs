use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Age at which a student signs their own contract.
pub const SIGNING_AGE: u32 = 18;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Division {
    Professional,
    #[serde(rename = "Pre-Professional")]
    PreProfessional,
    Supplemental,
}

impl Division {
    pub const ALL: [Division; 3] = [
        Division::Professional,
        Division::PreProfessional,
        Division::Supplemental,
    ];

    /// Name as stored in the backend and passed to the rate functions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Professional => "Professional",
            Division::PreProfessional => "Pre-Professional",
            Division::Supplemental => "Supplemental",
        }
    }
}

impl std::fmt::Display for Division {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
    Withdrawn,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub division: Division,
    #[serde(default)]
    pub status: StudentStatus,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whole years of age on `date`, if a birth date is recorded.
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut years = date.year() - dob.year();
        if (date.month(), date.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// True only when the student is recorded as 18 or older on `date`.
    pub fn is_signing_age(&self, date: NaiveDate) -> bool {
        self.age_on(date).is_some_and(|age| age >= SIGNING_AGE)
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Parent {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Single-line postal address from whichever parts are present.
    pub fn mailing_address(&self) -> String {
        let city_line = [self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let city_line = match self.zip.as_deref().filter(|z| !z.is_empty()) {
            Some(zip) if !city_line.is_empty() => format!("{} {}", city_line, zip),
            Some(zip) => zip.to_string(),
            None => city_line,
        };
        [self.address.as_deref().unwrap_or(""), city_line.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Student as inserted by the enrollment workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub division: Division,
    #[serde(default)]
    pub status: StudentStatus,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParent {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

fn check_name(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} is required", field))
    } else {
        Ok(())
    }
}

fn check_email(value: Option<&str>) -> Result<(), String> {
    match value {
        Some(email) if !email.contains('@') || email.starts_with('@') || email.ends_with('@') => {
            Err(format!("'{}' is not a valid email address", email))
        }
        _ => Ok(()),
    }
}

impl NewStudent {
    pub fn validate(&self) -> Result<(), String> {
        check_name("Student first name", &self.first_name)?;
        check_name("Student last name", &self.last_name)?;
        check_email(self.email.as_deref())
    }
}

impl NewParent {
    pub fn validate(&self) -> Result<(), String> {
        check_name("Parent first name", &self.first_name)?;
        check_name("Parent last name", &self.last_name)?;
        check_email(self.email.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn student(dob: Option<&str>) -> Student {
        serde_json::from_value(json!({
            "id": "s1",
            "first_name": "Clara",
            "last_name": "Schumann",
            "date_of_birth": dob,
            "email": null,
            "phone": null,
            "division": "Pre-Professional",
            "parent_id": null,
            "created_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_division_wire_names() {
        let s = student(None);
        assert_eq!(s.division, Division::PreProfessional);
        assert_eq!(s.status, StudentStatus::Active);
        assert_eq!(
            serde_json::to_value(Division::PreProfessional).unwrap(),
            json!("Pre-Professional")
        );
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let s = student(Some("2008-10-19"));
        let day_before = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let birthday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(s.age_on(day_before), Some(17));
        assert!(!s.is_signing_age(day_before));
        assert_eq!(s.age_on(birthday), Some(18));
        assert!(s.is_signing_age(birthday));
    }

    #[test]
    fn test_unknown_dob_is_not_signing_age() {
        let s = student(None);
        assert!(!s.is_signing_age(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn test_mailing_address() {
        let parent: Parent = serde_json::from_value(json!({
            "id": "p1",
            "first_name": "Friedrich",
            "last_name": "Wieck",
            "email": "fw@example.com",
            "phone": null,
            "address": "12 Main St",
            "city": "Leipzig",
            "state": "SN",
            "zip": "04109",
            "created_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(parent.mailing_address(), "12 Main St, Leipzig, SN 04109");
    }

    #[test]
    fn test_validate_new_parent() {
        let mut p = NewParent {
            first_name: "A".into(),
            last_name: "B".into(),
            email: Some("nope".into()),
            phone: None,
            address: None,
            city: None,
            state: None,
            zip: None,
        };
        assert!(p.validate().is_err());
        p.email = Some("a@b.org".into());
        assert!(p.validate().is_ok());
        p.first_name = "  ".into();
        assert!(p.validate().is_err());
    }
}
