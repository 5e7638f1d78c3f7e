//! Dashboard summary.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::Backend;
use crate::models::{
    Activity, Contract, ContractStatus, Division, Document, PaymentSchedule, Student,
};
use crate::repo::{ActivityRepo, ContractRepo, DocumentRepo, PaymentScheduleRepo, StudentRepo};
use crate::tasks::{aggregate, OpenTask};

pub const UPCOMING_DAYS: u64 = 30;
pub const RECENT_ACTIVITY: usize = 10;
pub const TOP_TASKS: usize = 8;

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionCount {
    pub division: Division,
    pub count: usize,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_students: usize,
    pub by_division: Vec<DivisionCount>,
    pub awaiting_signatures: usize,
    pub executed_contracts: usize,
    pub overdue_count: usize,
    pub overdue_total: f64,
    pub upcoming_payments: Vec<PaymentSchedule>,
    pub pending_documents: usize,
    pub open_tasks: usize,
    pub top_tasks: Vec<OpenTask>,
    pub recent_activity: Vec<Activity>,
}

/// Everything the summary is computed from.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub students: Vec<Student>,
    pub contracts: Vec<Contract>,
    pub overdue: Vec<PaymentSchedule>,
    pub upcoming: Vec<PaymentSchedule>,
    pub pending_documents: Vec<Document>,
    pub activity: Vec<Activity>,
}

pub fn summarize(data: &DashboardData, today: NaiveDate) -> DashboardSummary {
    let active: Vec<&Student> = data.students.iter().filter(|s| s.is_active()).collect();
    let by_division = Division::ALL
        .iter()
        .map(|d| DivisionCount {
            division: *d,
            count: active.iter().filter(|s| s.division == *d).count(),
        })
        .collect();

    let students: HashMap<String, Student> = data
        .students
        .iter()
        .map(|s| (s.id.clone(), s.clone()))
        .collect();
    let awaiting_signatures = data
        .contracts
        .iter()
        .filter(|c| c.status.is_open())
        .filter(|c| {
            let student_signs = students
                .get(&c.student_id)
                .is_some_and(|s| s.is_signing_age(today));
            !c.is_fully_executed(student_signs)
        })
        .count();
    let executed_contracts = data
        .contracts
        .iter()
        .filter(|c| c.status == ContractStatus::Executed)
        .count();

    let overdue: Vec<&PaymentSchedule> = data
        .overdue
        .iter()
        .filter(|p| p.is_overdue_on(today))
        .collect();
    let pending_documents = data
        .pending_documents
        .iter()
        .filter(|d| d.status.is_pending())
        .count();

    let tasks = aggregate(
        &data.contracts,
        &data.overdue,
        &data.pending_documents,
        &students,
        today,
    );

    DashboardSummary {
        active_students: active.len(),
        by_division,
        awaiting_signatures,
        executed_contracts,
        overdue_count: overdue.len(),
        overdue_total: overdue.iter().map(|p| p.amount).sum(),
        upcoming_payments: data.upcoming.clone(),
        pending_documents,
        open_tasks: tasks.len(),
        top_tasks: tasks.into_iter().take(TOP_TASKS).collect(),
        recent_activity: data.activity.iter().take(RECENT_ACTIVITY).cloned().collect(),
    }
}

pub struct DashboardLoader<'a> {
    backend: &'a dyn Backend,
}

impl<'a> DashboardLoader<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Fetch every source one after the other.
    pub async fn fetch(&self, today: NaiveDate) -> Result<DashboardData> {
        let payments = PaymentScheduleRepo::new(self.backend);
        let horizon = today
            .checked_add_days(Days::new(UPCOMING_DAYS))
            .unwrap_or(NaiveDate::MAX);
        Ok(DashboardData {
            students: StudentRepo::new(self.backend).list(None).await?,
            contracts: ContractRepo::new(self.backend).list().await?,
            overdue: payments.overdue(today).await?,
            upcoming: payments.upcoming(today, horizon).await?,
            pending_documents: DocumentRepo::new(self.backend).pending().await?,
            activity: ActivityRepo::new(self.backend).recent(RECENT_ACTIVITY).await?,
        })
    }

    pub async fn load(&self, today: NaiveDate) -> Result<DashboardSummary> {
        let data = self.fetch(today).await?;
        let summary = summarize(&data, today);
        debug!(
            students = summary.active_students,
            tasks = summary.open_tasks,
            overdue = summary.overdue_count,
            "Dashboard loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tables, InMemoryBackend};
    use crate::testing::{contract_row, document_row, schedule_row, student_row};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        let mut withdrawn = student_row("s3", "Robert", "Schumann", None, None);
        withdrawn["status"] = json!("withdrawn");
        let mut supplemental = student_row("s2", "Johannes", "Brahms", Some("2000-05-07"), None);
        supplemental["division"] = json!("Supplemental");
        backend.seed(
            tables::STUDENTS,
            [
                student_row("s1", "Clara", "Wieck", Some("2012-09-13"), None),
                supplemental,
                withdrawn,
            ],
        );
        backend.seed(
            tables::CONTRACTS,
            [
                contract_row("c1", "s1", "sent", [true, false, false], "2026-09-01T00:00:00Z"),
                contract_row("c2", "s2", "executed", [true, true, true], "2026-09-02T00:00:00Z"),
            ],
        );
        backend.seed(
            tables::PAYMENT_SCHEDULES,
            [
                schedule_row("p1", "s1", 450.0, "2026-10-01", "pending"),
                schedule_row("p2", "s2", 100.5, "2026-09-15", "overdue"),
                schedule_row("p3", "s1", 450.0, "2026-11-01", "pending"),
                schedule_row("p4", "s1", 450.0, "2026-12-01", "pending"),
            ],
        );
        backend.seed(
            tables::DOCUMENTS,
            [document_row("d1", "s1", "sent", "2026-09-01T00:00:00Z")],
        );
        backend
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let backend = seeded();
        let summary = DashboardLoader::new(&backend).load(today()).await.unwrap();

        assert_eq!(summary.active_students, 2);
        assert_eq!(
            summary.by_division,
            vec![
                DivisionCount { division: Division::Professional, count: 1 },
                DivisionCount { division: Division::PreProfessional, count: 0 },
                DivisionCount { division: Division::Supplemental, count: 1 },
            ]
        );
        assert_eq!(summary.awaiting_signatures, 1);
        assert_eq!(summary.executed_contracts, 1);
        assert_eq!(summary.overdue_count, 2);
        assert!((summary.overdue_total - 550.5).abs() < f64::EPSILON);
        let upcoming: Vec<&str> = summary.upcoming_payments.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(upcoming, vec!["p3"]);
        assert_eq!(summary.pending_documents, 1);
        // two overdue payments, a director signature, a sent document
        assert_eq!(summary.open_tasks, 4);
        assert_eq!(summary.top_tasks[0].id, "overdue-payment-p1");
    }

    #[test]
    fn test_empty_data() {
        let summary = summarize(&DashboardData::default(), today());
        assert_eq!(summary.active_students, 0);
        assert_eq!(summary.overdue_total, 0.0);
        assert!(summary.top_tasks.is_empty());
        assert_eq!(summary.by_division.len(), 3);
    }
}
