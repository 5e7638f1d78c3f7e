//! Open-task aggregation.
//!
//! `aggregate` is pure: it turns already-fetched contracts, payment
//! schedules and documents into a ranked to-do list. Sources are
//! concatenated contracts, then payments, then documents, and the sort is
//! stable, so equal-ranked tasks keep that order and the same input always
//! yields the same list.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::Backend;
use crate::format::format_currency;
use crate::models::{Contract, Document, DocumentStatus, PaymentSchedule, Signer, Student};
use crate::repo::{ContractRepo, DocumentRepo, PaymentScheduleRepo, StudentRepo};

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    ParentSignature,
    StudentSignature,
    DirectorSignature,
    OverduePayment,
    PendingDocument,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ParentSignature => "parent-signature",
            TaskKind::StudentSignature => "student-signature",
            TaskKind::DirectorSignature => "director-signature",
            TaskKind::OverduePayment => "overdue-payment",
            TaskKind::PendingDocument => "pending-document",
        }
    }

    fn for_signer(signer: Signer) -> Self {
        match signer {
            Signer::Parent => TaskKind::ParentSignature,
            Signer::Student => TaskKind::StudentSignature,
            Signer::Director => TaskKind::DirectorSignature,
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Urgency {
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTask {
    /// `{kind}-{source_id}`
    pub id: String,
    pub kind: TaskKind,
    pub urgency: Urgency,
    pub title: String,
    pub detail: String,
    pub source_id: String,
    pub student_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OpenTask {
    fn new(
        kind: TaskKind,
        urgency: Urgency,
        source_id: &str,
        student_id: Option<&str>,
        timestamp: DateTime<Utc>,
        title: String,
        detail: String,
    ) -> Self {
        Self {
            id: format!("{}-{}", kind.as_str(), source_id),
            kind,
            urgency,
            title,
            detail,
            source_id: source_id.to_string(),
            student_id: student_id.map(str::to_string),
            timestamp,
        }
    }
}

fn student_name(students: &HashMap<String, Student>, id: Option<&str>) -> String {
    id.and_then(|id| students.get(id))
        .map(Student::full_name)
        .unwrap_or_else(|| "Unknown student".to_string())
}

/// Build the ranked task list: urgency high to low, then newest first.
pub fn aggregate(
    contracts: &[Contract],
    schedules: &[PaymentSchedule],
    documents: &[Document],
    students: &HashMap<String, Student>,
    today: NaiveDate,
) -> Vec<OpenTask> {
    let mut tasks = Vec::new();

    for contract in contracts.iter().filter(|c| c.status.is_open()) {
        let student = students.get(&contract.student_id);
        let student_signs = student.is_some_and(|s| s.is_signing_age(today));
        let name = student_name(students, Some(&contract.student_id));
        for signer in contract.missing_signatures(student_signs) {
            let urgency = match signer {
                Signer::Parent => Urgency::High,
                Signer::Student | Signer::Director => Urgency::Medium,
            };
            let title = match signer {
                Signer::Parent => "Parent signature needed",
                Signer::Student => "Student signature needed",
                Signer::Director => "Director signature needed",
            };
            tasks.push(OpenTask::new(
                TaskKind::for_signer(signer),
                urgency,
                &contract.id,
                Some(&contract.student_id),
                contract.created_at,
                title.to_string(),
                format!("Contract {} for {}", contract.contract_number, name),
            ));
        }
    }

    for schedule in schedules.iter().filter(|s| s.is_overdue_on(today)) {
        let days = schedule.days_overdue(today);
        tasks.push(OpenTask::new(
            TaskKind::OverduePayment,
            Urgency::High,
            &schedule.id,
            schedule.student_id.as_deref(),
            schedule.due_date.and_time(NaiveTime::MIN).and_utc(),
            format!("Overdue payment {}", format_currency(schedule.amount)),
            format!(
                "{}: {} ({} day{} overdue)",
                student_name(students, schedule.student_id.as_deref()),
                schedule.label(),
                days,
                if days == 1 { "" } else { "s" }
            ),
        ));
    }

    for document in documents.iter().filter(|d| d.status.is_pending()) {
        let urgency = if document.status == DocumentStatus::Sent {
            Urgency::Medium
        } else {
            Urgency::Low
        };
        tasks.push(OpenTask::new(
            TaskKind::PendingDocument,
            urgency,
            &document.id,
            document.student_id.as_deref(),
            document.created_at,
            format!("Document awaiting signature: {}", document.title),
            student_name(students, document.student_id.as_deref()),
        ));
    }

    // Stable: ties keep source order
    tasks.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    tasks
}

/// Fetches the three task sources (one query after another) and the
/// students they reference, then aggregates.
pub struct TaskLoader<'a> {
    backend: &'a dyn Backend,
}

impl<'a> TaskLoader<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn load(&self, today: NaiveDate) -> Result<Vec<OpenTask>> {
        let contracts = ContractRepo::new(self.backend).awaiting_signatures().await?;
        let schedules = PaymentScheduleRepo::new(self.backend).overdue(today).await?;
        let documents = DocumentRepo::new(self.backend).pending().await?;

        let student_ids: BTreeSet<String> = contracts
            .iter()
            .map(|c| c.student_id.clone())
            .chain(schedules.iter().filter_map(|s| s.student_id.clone()))
            .chain(documents.iter().filter_map(|d| d.student_id.clone()))
            .collect();
        let ids: Vec<String> = student_ids.into_iter().collect();
        let students: HashMap<String, Student> = StudentRepo::new(self.backend)
            .by_ids(&ids)
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let tasks = aggregate(&contracts, &schedules, &documents, &students, today);
        debug!(
            contracts = contracts.len(),
            payments = schedules.len(),
            documents = documents.len(),
            tasks = tasks.len(),
            "Open tasks aggregated"
        );
        Ok(tasks)
    }
}
