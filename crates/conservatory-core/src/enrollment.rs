//! New-student enrollment: parent, student, contract and payment plan in
//! one compensated sequence.

use anyhow::{bail, Context, Result};
use chrono::{Local, Months, NaiveDate};
use tracing::info;

use crate::backend::{tables, Backend};
use crate::contracts::{ContractGenerator, GeneratedContract, GeneratorOptions};
use crate::models::{
    Activity, ActivityKind, Contract, NewActivity, NewParent, NewPaymentSchedule, NewStudent,
    Parent, PaymentSchedule, PaymentStatus, Student,
};
use crate::saga::Saga;

/// Most monthly installments a plan may have.
pub const MAX_INSTALLMENTS: u32 = 24;

#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    pub parent: NewParent,
    /// `parent_id` is filled in from the inserted parent.
    pub student: NewStudent,
    pub template_id: String,
    pub first_due_date: NaiveDate,
    pub installments: u32,
}

impl EnrollmentRequest {
    pub fn validate(&self) -> Result<()> {
        self.parent.validate().map_err(anyhow::Error::msg)?;
        self.student.validate().map_err(anyhow::Error::msg)?;
        if self.template_id.trim().is_empty() {
            bail!("A contract template is required");
        }
        if self.installments == 0 || self.installments > MAX_INSTALLMENTS {
            bail!(
                "Installment count must be between 1 and {}, got {}",
                MAX_INSTALLMENTS,
                self.installments
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub parent: Parent,
    pub student: Student,
    pub contract: GeneratedContract,
    pub schedules: Vec<PaymentSchedule>,
}

/// Registration fee due on `first_due`, then one tuition row per month
/// starting the same day. A zero fee gets no row.
pub fn installment_plan(
    contract: &Contract,
    first_due: NaiveDate,
    installments: u32,
) -> Result<Vec<NewPaymentSchedule>> {
    let mut plan = Vec::with_capacity(installments as usize + 1);
    if contract.registration_fee > 0.0 {
        plan.push(NewPaymentSchedule {
            contract_id: Some(contract.id.clone()),
            student_id: Some(contract.student_id.clone()),
            category_id: None,
            description: Some(format!("Registration fee {}", contract.season)),
            amount: contract.registration_fee,
            due_date: first_due,
            status: PaymentStatus::Pending,
        });
    }
    for month in 0..installments {
        let due_date = first_due
            .checked_add_months(Months::new(month))
            .context("Installment due date is out of range")?;
        plan.push(NewPaymentSchedule {
            contract_id: Some(contract.id.clone()),
            student_id: Some(contract.student_id.clone()),
            category_id: None,
            description: Some(format!("Tuition {}", due_date.format("%B %Y"))),
            amount: contract.monthly_tuition,
            due_date,
            status: PaymentStatus::Pending,
        });
    }
    Ok(plan)
}

pub struct EnrollmentWorkflow<'a> {
    backend: &'a dyn Backend,
    options: GeneratorOptions,
    today: NaiveDate,
}

impl<'a> EnrollmentWorkflow<'a> {
    pub fn new(backend: &'a dyn Backend, options: GeneratorOptions) -> Self {
        Self {
            backend,
            options,
            today: Local::now().date_naive(),
        }
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn enroll(&self, request: &EnrollmentRequest) -> Result<Enrollment> {
        request.validate()?;
        let mut saga = Saga::new("enroll_student", self.backend);
        let result = self.enroll_in(&mut saga, request).await;
        saga.finish(result).await
    }

    async fn enroll_in(&self, saga: &mut Saga<'_>, request: &EnrollmentRequest) -> Result<Enrollment> {
        let parent: Parent = saga.insert(tables::PARENTS, &request.parent).await?;

        let new_student = NewStudent {
            parent_id: Some(parent.id.clone()),
            ..request.student.clone()
        };
        let student: Student = saga.insert(tables::STUDENTS, &new_student).await?;

        let contract = ContractGenerator::new(self.backend, self.options.clone())
            .on(self.today)
            .generate_in(saga, &request.template_id, &student.id)
            .await?;

        let mut schedules = Vec::new();
        for row in installment_plan(&contract.contract, request.first_due_date, request.installments)? {
            let schedule: PaymentSchedule = saga.insert(tables::PAYMENT_SCHEDULES, &row).await?;
            schedules.push(schedule);
        }

        let _: Activity = saga
            .insert(
                tables::ACTIVITIES,
                &NewActivity::new(
                    ActivityKind::StudentEnrolled,
                    format!(
                        "{} enrolled in the {} division",
                        student.full_name(),
                        student.division
                    ),
                )
                .student(&student.id)
                .contract(&contract.contract.id)
                .meta("installments", request.installments),
            )
            .await?;

        info!(
            student_id = %student.id,
            contract_id = %contract.contract.id,
            schedules = schedules.len(),
            "Student enrolled"
        );
        Ok(Enrollment {
            parent,
            student,
            contract,
            schedules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Division, StudentStatus};
    use crate::testing::contract_row;

    fn request(installments: u32) -> EnrollmentRequest {
        EnrollmentRequest {
            parent: NewParent {
                first_name: "Friedrich".into(),
                last_name: "Wieck".into(),
                email: Some("friedrich@example.org".into()),
                phone: None,
                address: None,
                city: None,
                state: None,
                zip: None,
            },
            student: NewStudent {
                first_name: "Clara".into(),
                last_name: "Wieck".into(),
                date_of_birth: None,
                email: None,
                phone: None,
                division: Division::Professional,
                status: StudentStatus::Active,
                parent_id: None,
            },
            template_id: "t1".into(),
            first_due_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            installments,
        }
    }

    #[test]
    fn test_plan_fee_then_monthly() {
        let contract: Contract = serde_json::from_value(contract_row(
            "c1",
            "s1",
            "draft",
            [false; 3],
            "2026-08-20T00:00:00Z",
        ))
        .unwrap();
        let plan = installment_plan(&contract, NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(), 3).unwrap();
        let dues: Vec<String> = plan.iter().map(|p| p.due_date.to_string()).collect();
        assert_eq!(dues, vec!["2026-09-30", "2026-09-30", "2026-10-30", "2026-11-30"]);
        assert_eq!(plan[0].amount, 100.0);
        assert!(plan[1..].iter().all(|p| p.amount == 450.0));
        assert_eq!(plan[2].description.as_deref(), Some("Tuition October 2026"));
    }

    #[test]
    fn test_plan_clamps_month_end() {
        let mut contract: Contract = serde_json::from_value(contract_row(
            "c1",
            "s1",
            "draft",
            [false; 3],
            "2026-08-20T00:00:00Z",
        ))
        .unwrap();
        contract.registration_fee = 0.0;
        let plan = installment_plan(&contract, NaiveDate::from_ymd_opt(2027, 1, 31).unwrap(), 2).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].due_date, NaiveDate::from_ymd_opt(2027, 2, 28).unwrap());
    }

    #[test]
    fn test_request_validation() {
        assert!(request(10).validate().is_ok());
        assert!(request(0).validate().is_err());
        assert!(request(MAX_INSTALLMENTS + 1).validate().is_err());
        let mut bad = request(10);
        bad.parent.last_name = "  ".into();
        assert!(bad.validate().unwrap_err().to_string().contains("Parent last name"));
    }
}
