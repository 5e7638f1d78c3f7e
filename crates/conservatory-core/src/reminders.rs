//! Payment reminder job.
//!
//! Finds unpaid schedules due before today, marks pending ones overdue and
//! sends one reminder per schedule to the parent (or the student when no
//! parent email is on file). A row that fails is recorded in the report
//! and the job moves on to the next one.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::email::{EmailRequest, EmailService};
use crate::format::{format_currency, format_long_date};
use crate::models::{ActivityKind, NewActivity, Parent, PaymentSchedule, PaymentStatus, Student};
use crate::repo::{ActivityRepo, ParentRepo, PaymentScheduleRepo, StudentRepo};
use crate::template::{substitute, TemplateValues};

const REMINDER_SUBJECT: &str = "Payment reminder: {{amount}} for {{student_name}}";

const REMINDER_BODY: &str = "<p>Dear {{recipient_name}},</p>\
<p>Our records show that the payment of <strong>{{amount}}</strong> \
({{description}}) for {{student_name}} was due on {{due_date}} and is now \
{{days_overdue}} day(s) overdue.</p>\
<p>Please arrange payment at your earliest convenience. If you have already \
paid, thank you and please disregard this message.</p>";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderOptions {
    /// Only remind for these students.
    pub student_ids: Option<Vec<String>>,
    /// Work out the reminders without writing or sending anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReminderOutcome {
    Sent { message_id: String },
    DryRun,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderItem {
    pub schedule_id: String,
    pub student_id: Option<String>,
    pub recipient: Option<String>,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub days_overdue: u32,
    #[serde(flatten)]
    pub outcome: ReminderOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderReport {
    pub items: Vec<ReminderItem>,
}

impl ReminderReport {
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, ReminderOutcome::Sent { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ReminderOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&ReminderOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

pub struct PaymentReminderJob<'a> {
    backend: &'a dyn Backend,
    email: &'a EmailService,
    today: NaiveDate,
}

struct Recipient {
    name: String,
    address: String,
}

impl<'a> PaymentReminderJob<'a> {
    pub fn new(backend: &'a dyn Backend, email: &'a EmailService) -> Self {
        Self {
            backend,
            email,
            today: Local::now().date_naive(),
        }
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn run(&self, options: &ReminderOptions) -> Result<ReminderReport> {
        let schedules = PaymentScheduleRepo::new(self.backend)
            .past_due(self.today, options.student_ids.as_deref())
            .await?;
        let mut report = ReminderReport::default();
        if schedules.is_empty() {
            info!("No overdue payments to remind");
            return Ok(report);
        }

        let student_ids: Vec<String> = schedules
            .iter()
            .filter_map(|s| s.student_id.clone())
            .collect();
        let students: HashMap<String, Student> = StudentRepo::new(self.backend)
            .by_ids(&student_ids)
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let parent_ids: Vec<String> = students
            .values()
            .filter_map(|s| s.parent_id.clone())
            .collect();
        let parents: HashMap<String, Parent> = ParentRepo::new(self.backend)
            .by_ids(&parent_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        for schedule in &schedules {
            let student = schedule.student_id.as_ref().and_then(|id| students.get(id));
            let parent = student
                .and_then(|s| s.parent_id.as_ref())
                .and_then(|id| parents.get(id));
            let recipient = recipient_for(student, parent);
            let days_overdue = schedule.days_overdue(self.today);

            let outcome = match (&recipient, options.dry_run) {
                (None, _) => ReminderOutcome::Failed {
                    reason: "No email address on file".to_string(),
                },
                (Some(_), true) => ReminderOutcome::DryRun,
                (Some(to), false) => match self.remind(schedule, student, to, days_overdue).await {
                    Ok(message_id) => ReminderOutcome::Sent { message_id },
                    Err(e) => ReminderOutcome::Failed {
                        reason: format!("{:#}", e),
                    },
                },
            };
            if let ReminderOutcome::Failed { reason } = &outcome {
                warn!(schedule_id = %schedule.id, reason = %reason, "Payment reminder failed");
            }

            report.items.push(ReminderItem {
                schedule_id: schedule.id.clone(),
                student_id: schedule.student_id.clone(),
                recipient: recipient.map(|r| r.address),
                amount: schedule.amount,
                due_date: schedule.due_date,
                days_overdue,
                outcome,
            });
        }

        info!(
            total = report.items.len(),
            sent = report.sent(),
            failed = report.failed(),
            dry_run = options.dry_run,
            "Payment reminders processed"
        );
        Ok(report)
    }

    async fn remind(
        &self,
        schedule: &PaymentSchedule,
        student: Option<&Student>,
        to: &Recipient,
        days_overdue: u32,
    ) -> Result<String> {
        let student = student.ok_or_else(|| anyhow!("Schedule has no student"))?;
        if schedule.status == PaymentStatus::Pending {
            PaymentScheduleRepo::new(self.backend)
                .mark_overdue(&schedule.id)
                .await?;
        }

        let values = reminder_values(schedule, student, &to.name, days_overdue);
        let message_id = self
            .email
            .send_recorded(
                self.backend,
                EmailRequest {
                    to: vec![to.address.clone()],
                    subject: substitute(REMINDER_SUBJECT, &values),
                    html: substitute(REMINDER_BODY, &values),
                    student_id: Some(student.id.clone()),
                    ..Default::default()
                },
            )
            .await?;

        ActivityRepo::new(self.backend)
            .log(
                &NewActivity::new(
                    ActivityKind::PaymentReminderSent,
                    format!(
                        "Payment reminder sent for {} ({} overdue)",
                        student.full_name(),
                        format_currency(schedule.amount)
                    ),
                )
                .student(&student.id)
                .meta("schedule_id", schedule.id.as_str())
                .meta("days_overdue", days_overdue)
                .meta("amount", schedule.amount),
            )
            .await?;
        Ok(message_id)
    }
}

fn recipient_for(student: Option<&Student>, parent: Option<&Parent>) -> Option<Recipient> {
    let from_parent = parent.and_then(|p| {
        p.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(|e| Recipient {
                name: p.full_name(),
                address: e.to_string(),
            })
    });
    from_parent.or_else(|| {
        student.and_then(|s| {
            s.email
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .map(|e| Recipient {
                    name: s.full_name(),
                    address: e.to_string(),
                })
        })
    })
}

fn reminder_values(
    schedule: &PaymentSchedule,
    student: &Student,
    recipient_name: &str,
    days_overdue: u32,
) -> TemplateValues {
    TemplateValues::new()
        .with("recipient_name", recipient_name)
        .with("student_name", student.full_name())
        .with("amount", format_currency(schedule.amount))
        .with("description", schedule.label())
        .with("due_date", format_long_date(schedule.due_date))
        .with("days_overdue", days_overdue.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tables, InMemoryBackend};
    use crate::email::RecordingProvider;
    use crate::testing::{parent_row, schedule_row, student_row};
    use serde_json::json;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.seed(
            tables::PARENTS,
            [parent_row("p1", "Friedrich", "Wieck", Some("friedrich@example.org"))],
        );
        backend.seed(
            tables::STUDENTS,
            [
                student_row("s1", "Clara", "Wieck", Some("2012-09-13"), Some("p1")),
                student_row("s2", "Johannes", "Brahms", Some("2000-05-07"), None),
            ],
        );
        backend.seed(
            tables::PAYMENT_SCHEDULES,
            [
                schedule_row("pay1", "s1", 450.0, "2026-10-01", "pending"),
                schedule_row("pay2", "s2", 100.0, "2026-09-01", "overdue"),
                schedule_row("pay3", "s1", 450.0, "2026-11-01", "pending"),
                schedule_row("pay4", "s1", 450.0, "2026-08-01", "paid"),
            ],
        );
        backend
    }

    #[tokio::test]
    async fn test_one_reminder_per_past_due_row() {
        let backend = seeded();
        let provider = RecordingProvider::new();
        let email = EmailService::new(Arc::new(provider.clone()), "office@example.org");

        let report = PaymentReminderJob::new(&backend, &email)
            .on(today())
            .run(&ReminderOptions::default())
            .await
            .unwrap();

        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 0);
        let sent = provider.sent();
        assert_eq!(sent.len(), 2);
        // oldest due first
        assert_eq!(sent[0].to, vec!["johannes@students.example.org".to_string()]);
        assert_eq!(sent[1].to, vec!["friedrich@example.org".to_string()]);
        assert!(sent[1].html.contains("18 day(s) overdue"));
        assert!(sent[1].html.contains("Dear Friedrich Wieck"));

        let schedules = backend.rows(tables::PAYMENT_SCHEDULES);
        assert_eq!(schedules[0]["status"], json!("overdue"));
        assert_eq!(schedules[2]["status"], json!("pending"));

        let reminders = backend
            .rows(tables::ACTIVITIES)
            .into_iter()
            .filter(|a| a["kind"] == json!("payment_reminder_sent"))
            .count();
        assert_eq!(reminders, 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let backend = seeded();
        let provider = RecordingProvider::new();
        let email = EmailService::new(Arc::new(provider.clone()), "office@example.org");
        let options = ReminderOptions {
            student_ids: Some(vec!["s1".to_string()]),
            dry_run: true,
        };

        let report = PaymentReminderJob::new(&backend, &email)
            .on(today())
            .run(&options)
            .await
            .unwrap();

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].outcome, ReminderOutcome::DryRun);
        assert_eq!(report.items[0].days_overdue, 18);
        assert!(provider.sent().is_empty());
        assert!(backend.rows(tables::ACTIVITIES).is_empty());
        assert_eq!(backend.rows(tables::PAYMENT_SCHEDULES)[0]["status"], json!("pending"));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let backend = seeded();
        backend.seed(
            tables::STUDENTS,
            [json!({
                "id": "s3",
                "first_name": "No",
                "last_name": "Email",
                "date_of_birth": null,
                "email": null,
                "phone": null,
                "division": "Supplemental",
                "status": "active",
                "parent_id": null,
                "created_at": "2026-08-01T00:00:00Z"
            })],
        );
        backend.seed(
            tables::PAYMENT_SCHEDULES,
            [schedule_row("pay5", "s3", 75.0, "2026-08-15", "pending")],
        );
        let provider = RecordingProvider::new();
        let email = EmailService::new(Arc::new(provider.clone()), "office@example.org");

        let report = PaymentReminderJob::new(&backend, &email)
            .on(today())
            .run(&ReminderOptions::default())
            .await
            .unwrap();

        assert_eq!(report.items.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.sent(), 2);
        assert_eq!(report.items[0].schedule_id, "pay5");
    }
}
