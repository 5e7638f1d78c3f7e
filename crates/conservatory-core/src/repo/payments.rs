use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;

use crate::backend::{tables, Backend, Query};
use crate::models::{
    Division, NewPaymentCategory, NewPaymentSchedule, NewTuitionRate, PaymentCategory,
    PaymentSchedule, PaymentStatus, TuitionRate,
};

use super::{insert, select, select_one, update_one};

pub struct PaymentScheduleRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> PaymentScheduleRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, id: &str) -> Result<PaymentSchedule> {
        select_one(self.backend, tables::PAYMENT_SCHEDULES, id).await
    }

    pub async fn for_contract(&self, contract_id: &str) -> Result<Vec<PaymentSchedule>> {
        let query = Query::new()
            .eq("contract_id", contract_id)
            .order_asc("due_date");
        select(self.backend, tables::PAYMENT_SCHEDULES, &query).await
    }

    /// Unpaid schedules due strictly before `today`, oldest due first.
    /// `student_ids` narrows the result to those students when given.
    pub async fn past_due(
        &self,
        today: NaiveDate,
        student_ids: Option<&[String]>,
    ) -> Result<Vec<PaymentSchedule>> {
        let mut query = Query::new()
            .in_list(
                "status",
                [json!(PaymentStatus::Pending), json!(PaymentStatus::Overdue)],
            )
            .lt("due_date", today.to_string());
        if let Some(ids) = student_ids {
            query = query.in_list("student_id", ids.iter().cloned());
        }
        select(
            self.backend,
            tables::PAYMENT_SCHEDULES,
            &query.order_asc("due_date"),
        )
        .await
    }

    /// Schedules that count as overdue on `today`: marked overdue, or
    /// pending past their due date. Newest due date first.
    pub async fn overdue(&self, today: NaiveDate) -> Result<Vec<PaymentSchedule>> {
        let query = Query::new()
            .in_list(
                "status",
                [json!(PaymentStatus::Pending), json!(PaymentStatus::Overdue)],
            )
            .order_desc("due_date");
        let rows: Vec<PaymentSchedule> =
            select(self.backend, tables::PAYMENT_SCHEDULES, &query).await?;
        Ok(rows.into_iter().filter(|p| p.is_overdue_on(today)).collect())
    }

    /// Unpaid schedules due within `[from, to]`, soonest first.
    pub async fn upcoming(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentSchedule>> {
        let query = Query::new()
            .eq("status", json!(PaymentStatus::Pending))
            .gte("due_date", from.to_string())
            .lte("due_date", to.to_string())
            .order_asc("due_date");
        select(self.backend, tables::PAYMENT_SCHEDULES, &query).await
    }

    pub async fn insert(&self, schedule: &NewPaymentSchedule) -> Result<PaymentSchedule> {
        insert(self.backend, tables::PAYMENT_SCHEDULES, schedule).await
    }

    pub async fn mark_overdue(&self, id: &str) -> Result<PaymentSchedule> {
        update_one(
            self.backend,
            tables::PAYMENT_SCHEDULES,
            id,
            json!({ "status": PaymentStatus::Overdue }),
        )
        .await
    }

    pub async fn mark_paid(&self, id: &str, paid_on: NaiveDate) -> Result<PaymentSchedule> {
        update_one(
            self.backend,
            tables::PAYMENT_SCHEDULES,
            id,
            json!({ "status": PaymentStatus::Paid, "paid_date": paid_on }),
        )
        .await
    }
}

pub struct PaymentCategoryRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> PaymentCategoryRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<PaymentCategory>> {
        let mut query = Query::new();
        if active_only {
            query = query.eq("is_active", true);
        }
        select(
            self.backend,
            tables::PAYMENT_CATEGORIES,
            &query.order_asc("name"),
        )
        .await
    }

    pub async fn insert(&self, category: &NewPaymentCategory) -> Result<PaymentCategory> {
        insert(self.backend, tables::PAYMENT_CATEGORIES, category).await
    }

    pub async fn update(&self, id: &str, category: &NewPaymentCategory) -> Result<PaymentCategory> {
        update_one(
            self.backend,
            tables::PAYMENT_CATEGORIES,
            id,
            super::encode(category)?,
        )
        .await
    }
}

pub struct TuitionRateRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> TuitionRateRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> Result<Vec<TuitionRate>> {
        select(
            self.backend,
            tables::TUITION_RATES,
            &Query::new().order_asc("division"),
        )
        .await
    }

    pub async fn active_for(&self, division: Division) -> Result<Option<TuitionRate>> {
        let query = Query::new()
            .eq("division", json!(division))
            .eq("is_active", true)
            .limit(1);
        let rates: Vec<TuitionRate> = select(self.backend, tables::TUITION_RATES, &query).await?;
        Ok(rates.into_iter().next())
    }

    pub async fn insert(&self, rate: &NewTuitionRate) -> Result<TuitionRate> {
        if rate.monthly_amount < 0.0 || rate.registration_fee < 0.0 {
            anyhow::bail!("Tuition amounts cannot be negative");
        }
        insert(self.backend, tables::TUITION_RATES, rate).await
    }

    pub async fn update(&self, id: &str, rate: &NewTuitionRate) -> Result<TuitionRate> {
        if rate.monthly_amount < 0.0 || rate.registration_fee < 0.0 {
            anyhow::bail!("Tuition amounts cannot be negative");
        }
        update_one(self.backend, tables::TUITION_RATES, id, super::encode(rate)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seed(backend: &InMemoryBackend) {
        let row = |id: &str, student: &str, status: &str, due: &str| {
            json!({
                "id": id, "contract_id": "c1", "student_id": student, "amount": 450.0,
                "due_date": due, "status": status, "created_at": "2026-08-01T00:00:00Z"
            })
        };
        backend.seed(
            tables::PAYMENT_SCHEDULES,
            vec![
                row("p1", "s1", "pending", "2026-09-01"),
                row("p2", "s1", "overdue", "2026-08-01"),
                row("p3", "s2", "pending", "2026-10-01"),
                row("p4", "s1", "paid", "2026-07-01"),
                row("p5", "s2", "pending", "2026-11-01"),
                row("p6", "s2", "overdue", "2026-12-01"),
            ],
        );
    }

    #[tokio::test]
    async fn test_past_due() {
        let backend = InMemoryBackend::new();
        seed(&backend);
        let repo = PaymentScheduleRepo::new(&backend);
        let today = day("2026-10-19");

        let ids: Vec<_> = repo
            .past_due(today, None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2", "p1", "p3"]);

        let only_s2 = vec!["s2".to_string()];
        let ids: Vec<_> = repo
            .past_due(today, Some(&only_s2))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p3"]);
    }

    #[tokio::test]
    async fn test_overdue_includes_marked_future_rows() {
        let backend = InMemoryBackend::new();
        seed(&backend);
        let ids: Vec<_> = PaymentScheduleRepo::new(&backend)
            .overdue(day("2026-10-19"))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p6", "p3", "p1", "p2"]);
    }

    #[tokio::test]
    async fn test_mark_paid() {
        let backend = InMemoryBackend::new();
        seed(&backend);
        let paid = PaymentScheduleRepo::new(&backend)
            .mark_paid("p1", day("2026-10-19"))
            .await
            .unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.paid_date, Some(day("2026-10-19")));
    }

    #[tokio::test]
    async fn test_tuition_rate_rejects_negative() {
        let backend = InMemoryBackend::new();
        let repo = TuitionRateRepo::new(&backend);
        let rate = NewTuitionRate {
            division: Division::Professional,
            season: Some("2026-2027".into()),
            monthly_amount: -1.0,
            registration_fee: 100.0,
            is_active: true,
        };
        assert!(repo.insert(&rate).await.is_err());
        assert!(repo.active_for(Division::Professional).await.unwrap().is_none());
    }
}
