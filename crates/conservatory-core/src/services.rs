//! Shared handles used by every front end.
//!
//! `Services` owns the backend client, the email service, the notifier and
//! the configuration. Actions triggered by the administrator go through
//! `run_action`: a failure is logged with its full context and the user
//! gets a short notice; nothing is retried.

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate, Utc};
use tracing::error;

use crate::backend::{Backend, RestBackend};
use crate::config::Config;
use crate::contracts::{sign_contract, ContractGenerator, GeneratedContract};
use crate::dashboard::{DashboardLoader, DashboardSummary};
use crate::email::{EmailRequest, EmailService, HttpEmailProvider};
use crate::enrollment::{Enrollment, EnrollmentRequest, EnrollmentWorkflow};
use crate::models::{Contract, PaymentSchedule, Signer};
use crate::notify::Notifier;
use crate::payments::{record_payment, upload_template_image};
use crate::reminders::{PaymentReminderJob, ReminderOptions, ReminderReport};
use crate::tasks::{OpenTask, TaskLoader};

#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn Backend>,
    pub email: Option<EmailService>,
    pub notifier: Notifier,
    pub config: Config,
}

impl Services {
    pub fn new(
        backend: Arc<dyn Backend>,
        email: Option<EmailService>,
        notifier: Notifier,
        config: Config,
    ) -> Self {
        Self {
            backend,
            email,
            notifier,
            config,
        }
    }

    /// Build the HTTP-backed services from configuration and an optional
    /// access token.
    pub fn connect(config: Config, token: Option<String>, notifier: Notifier) -> Result<Self> {
        let (url, key) = config.require_backend()?;
        let mut backend = RestBackend::new(url, key)?;
        if let Some(token) = token {
            backend.set_token(token);
        }

        let email = match (
            config.email_api_url.as_deref(),
            config.email_api_key.as_deref(),
            config.email_from.as_deref(),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(EmailService::new(
                Arc::new(HttpEmailProvider::new(api_url, api_key)?),
                from,
            )),
            _ => None,
        };

        Ok(Self::new(Arc::new(backend), email, notifier, config))
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn email(&self) -> Result<&EmailService> {
        self.email
            .as_ref()
            .ok_or_else(|| anyhow!("Email is not configured"))
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Await a user action. On failure the error is logged and a generic
    /// notice is pushed; the caller gets `None`.
    pub async fn run_action<T, F>(&self, label: &str, action: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        match action.await {
            Ok(value) => Some(value),
            Err(e) => {
                let detail = format!("{:#}", e);
                error!(action = label, error = %detail, "Action failed");
                self.notifier
                    .error(format!("{} failed. See the log for details.", label));
                None
            }
        }
    }

    pub async fn generate_contract(
        &self,
        template_id: &str,
        student_id: &str,
    ) -> Result<GeneratedContract> {
        ContractGenerator::new(self.backend(), self.config.generator_options())
            .generate(template_id, student_id)
            .await
    }

    pub async fn enroll(&self, request: &EnrollmentRequest) -> Result<Enrollment> {
        EnrollmentWorkflow::new(self.backend(), self.config.generator_options())
            .enroll(request)
            .await
    }

    pub async fn sign(&self, contract_id: &str, signer: Signer, image: &str) -> Result<Contract> {
        sign_contract(
            self.backend(),
            contract_id,
            signer,
            image,
            Utc::now(),
            Self::today(),
        )
        .await
    }

    pub async fn send_email(&self, request: &EmailRequest) -> Result<String> {
        self.email()?.dispatch(self.backend(), request).await
    }

    pub async fn send_reminders(&self, options: &ReminderOptions) -> Result<ReminderReport> {
        PaymentReminderJob::new(self.backend(), self.email()?)
            .run(options)
            .await
    }

    pub async fn record_payment(&self, schedule_id: &str, paid_on: NaiveDate) -> Result<PaymentSchedule> {
        record_payment(self.backend(), schedule_id, paid_on).await
    }

    pub async fn upload_template_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        email_template_id: Option<&str>,
    ) -> Result<String> {
        upload_template_image(
            self.backend(),
            self.config.storage_bucket(),
            file_name,
            bytes,
            email_template_id,
        )
        .await
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary> {
        DashboardLoader::new(self.backend()).load(Self::today()).await
    }

    pub async fn open_tasks(&self) -> Result<Vec<OpenTask>> {
        TaskLoader::new(self.backend()).load(Self::today()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::notify::NoticeLevel;

    #[tokio::test]
    async fn test_run_action_reports_failure() {
        let (notifier, mut rx) = Notifier::channel();
        let services = Services::new(
            Arc::new(InMemoryBackend::new()),
            None,
            notifier,
            Config::default(),
        );

        let ok = services.run_action("Load", async { Ok(3) }).await;
        assert_eq!(ok, Some(3));
        assert!(rx.try_recv().is_err());

        let failed = services
            .run_action("Send reminders", services.send_reminders(&ReminderOptions::default()))
            .await;
        assert!(failed.is_none());
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Send reminders failed. See the log for details.");
    }

    #[test]
    fn test_connect_requires_backend() {
        let (notifier, _rx) = Notifier::channel();
        assert!(Services::connect(Config::default(), None, notifier).is_err());
    }
}
