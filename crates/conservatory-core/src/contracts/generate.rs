//! Render a contract template for one student and persist the result.

use anyhow::{bail, Context, Result};
use chrono::{Local, Months, NaiveDate};
use tracing::{debug, info, warn};

use crate::backend::{tables, Backend};
use crate::format::{format_currency, format_long_date, format_phone, season_for};
use crate::models::{
    Activity, ActivityKind, Contract, ContractStatus, ContractTemplate, Document, DocumentStatus,
    NewActivity, NewContract, NewDocument, Parent, Student,
};
use crate::repo::{ContractTemplateRepo, RemoteFunctions, StudentRepo};
use crate::saga::Saga;
use crate::template::{self, TemplateValues};

#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Filled into `{{director_name}}`; the token stays verbatim when unset.
    pub director_name: Option<String>,
    /// HTML-escape substituted values.
    pub escape_values: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedContract {
    pub contract: Contract,
    pub document: Document,
    pub html: String,
}

pub struct ContractGenerator<'a> {
    backend: &'a dyn Backend,
    options: GeneratorOptions,
    today: NaiveDate,
}

impl<'a> ContractGenerator<'a> {
    pub fn new(backend: &'a dyn Backend, options: GeneratorOptions) -> Self {
        Self {
            backend,
            options,
            today: Local::now().date_naive(),
        }
    }

    /// Generate as of a fixed date instead of the local clock.
    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Fetch, render and persist a contract. Rows written before a failing
    /// step are deleted again.
    pub async fn generate(&self, template_id: &str, student_id: &str) -> Result<GeneratedContract> {
        let mut saga = Saga::new("generate_contract", self.backend);
        let result = self.generate_in(&mut saga, template_id, student_id).await;
        saga.finish(result).await
    }

    /// Same as `generate`, recording its inserts on a caller's saga.
    pub async fn generate_in(
        &self,
        saga: &mut Saga<'_>,
        template_id: &str,
        student_id: &str,
    ) -> Result<GeneratedContract> {
        let template = ContractTemplateRepo::new(self.backend)
            .get(template_id)
            .await?;
        if !template.is_active {
            bail!("Contract template '{}' is not active", template.name);
        }

        let (student, parent) = StudentRepo::new(self.backend)
            .get_with_parent(student_id)
            .await?;

        let new_contract = self.draft_contract(&template, &student).await?;
        let values = contract_values(
            &student,
            parent.as_ref(),
            &new_contract,
            self.today,
            self.options.director_name.as_deref(),
        );
        let html = self.render(&template, &values);

        let contract: Contract = saga.insert(tables::CONTRACTS, &new_contract).await?;
        debug!(contract_id = %contract.id, number = %contract.contract_number, "Contract row created");

        let document: Document = saga
            .insert(
                tables::DOCUMENTS,
                &NewDocument {
                    contract_id: Some(contract.id.clone()),
                    student_id: Some(student.id.clone()),
                    title: format!("{} - {}", template.name, student.full_name()),
                    content: html.clone(),
                    status: DocumentStatus::Draft,
                },
            )
            .await?;

        let _: Activity = saga
            .insert(
                tables::ACTIVITIES,
                &NewActivity::new(
                    ActivityKind::ContractGenerated,
                    format!(
                        "Contract {} generated for {}",
                        contract.contract_number,
                        student.full_name()
                    ),
                )
                .student(&student.id)
                .contract(&contract.id)
                .meta("template_id", template.id.as_str()),
            )
            .await?;

        info!(
            contract_id = %contract.id,
            student_id = %student.id,
            template_id = %template.id,
            "Contract generated"
        );
        Ok(GeneratedContract {
            contract,
            document,
            html,
        })
    }

    async fn draft_contract(&self, template: &ContractTemplate, student: &Student) -> Result<NewContract> {
        let functions = RemoteFunctions::new(self.backend);
        let monthly_tuition = functions.monthly_tuition(student.division).await?;
        let registration_fee = functions.registration_fee(student.division).await?;
        let contract_number = functions.next_contract_number().await?;
        let end_date = self
            .today
            .checked_add_months(Months::new(12))
            .context("Contract end date is out of range")?;

        Ok(NewContract {
            contract_number,
            student_id: student.id.clone(),
            template_id: Some(template.id.clone()),
            season: season_for(self.today),
            monthly_tuition,
            registration_fee,
            start_date: self.today,
            end_date,
            status: ContractStatus::Draft,
        })
    }

    fn render(&self, template: &ContractTemplate, values: &TemplateValues) -> String {
        let missing = template::unresolved(&template.content, values);
        if !missing.is_empty() {
            warn!(
                template_id = %template.id,
                placeholders = ?missing,
                "Template has placeholders with no value; they are left as-is"
            );
        }
        if self.options.escape_values {
            template::substitute(&template.content, &values.escaped())
        } else {
            template::substitute(&template.content, values)
        }
    }
}

/// Flat key/value record substituted into contract templates.
pub fn contract_values(
    student: &Student,
    parent: Option<&Parent>,
    contract: &NewContract,
    today: NaiveDate,
    director_name: Option<&str>,
) -> TemplateValues {
    let mut values = TemplateValues::new();
    values
        .set("student_name", student.full_name())
        .set("student_first_name", student.first_name.as_str())
        .set("student_last_name", student.last_name.as_str())
        .set(
            "student_dob",
            student.date_of_birth.map(format_long_date).unwrap_or_default(),
        )
        .set("student_email", student.email.clone().unwrap_or_default())
        .set("division", student.division.as_str())
        .set("parent_name", parent.map(Parent::full_name).unwrap_or_default())
        .set(
            "parent_email",
            parent.and_then(|p| p.email.clone()).unwrap_or_default(),
        )
        .set(
            "parent_phone",
            parent
                .and_then(|p| p.phone.as_deref())
                .map(format_phone)
                .unwrap_or_default(),
        )
        .set(
            "parent_address",
            parent.map(Parent::mailing_address).unwrap_or_default(),
        )
        .set("monthly_tuition", format_currency(contract.monthly_tuition))
        .set("registration_fee", format_currency(contract.registration_fee))
        .set("season", contract.season.as_str())
        .set("contract_number", contract.contract_number.as_str())
        .set("contract_date", format_long_date(today))
        .set("start_date", format_long_date(contract.start_date))
        .set("end_date", format_long_date(contract.end_date));
    if let Some(name) = director_name {
        values.set("director_name", name);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{backend_with_rates, parent_row, student_row, template_row};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[tokio::test]
    async fn test_inactive_template_rejected_without_writes() {
        let backend = backend_with_rates(450.0, 100.0, "CN-1");
        backend.seed(tables::CONTRACT_TEMPLATES, [template_row("t1", "x", false)]);
        backend.seed(tables::STUDENTS, [student_row("s1", "Clara", "Wieck", None, None)]);

        let err = ContractGenerator::new(&backend, GeneratorOptions::default())
            .on(today())
            .generate("t1", "s1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not active"));
        assert!(backend.rows(tables::CONTRACTS).is_empty());
    }

    #[tokio::test]
    async fn test_values_and_validity_window() {
        let backend = backend_with_rates(450.0, 100.0, "CN-2026-0007");
        backend.seed(
            tables::CONTRACT_TEMPLATES,
            [template_row(
                "t1",
                "<p>{{student_name}} / {{parent_name}} / {{parent_phone}} / {{end_date}} / {{director_name}}</p>",
                true,
            )],
        );
        backend.seed(tables::PARENTS, [parent_row("p1", "Friedrich", "Wieck", None)]);
        backend.seed(
            tables::STUDENTS,
            [student_row("s1", "Clara", "Wieck", Some("2010-09-13"), Some("p1"))],
        );

        let generated = ContractGenerator::new(&backend, GeneratorOptions::default())
            .on(today())
            .generate("t1", "s1")
            .await
            .unwrap();

        assert_eq!(
            generated.html,
            "<p>Clara Wieck / Friedrich Wieck / (555) 123-4567 / October 19, 2027 / {{director_name}}</p>"
        );
        assert_eq!(generated.contract.start_date, today());
        assert_eq!(
            generated.contract.end_date,
            NaiveDate::from_ymd_opt(2027, 10, 19).unwrap()
        );
        assert_eq!(generated.contract.season, "2026-2027");
        assert_eq!(generated.contract.status, ContractStatus::Draft);
        assert_eq!(generated.document.contract_id.as_deref(), Some(generated.contract.id.as_str()));
        assert_eq!(backend.rows(tables::ACTIVITIES).len(), 1);
    }

    #[tokio::test]
    async fn test_escape_option() {
        let backend = backend_with_rates(450.0, 100.0, "CN-1");
        backend.seed(tables::CONTRACT_TEMPLATES, [template_row("t1", "{{student_last_name}}", true)]);
        backend.seed(tables::STUDENTS, [student_row("s1", "Ann", "<Smith & Co>", None, None)]);

        let options = GeneratorOptions {
            escape_values: true,
            ..Default::default()
        };
        let generated = ContractGenerator::new(&backend, options)
            .on(today())
            .generate("t1", "s1")
            .await
            .unwrap();
        assert_eq!(generated.html, "&lt;Smith &amp; Co&gt;");
    }
}
