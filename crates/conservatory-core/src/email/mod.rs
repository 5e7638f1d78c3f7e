//! Email dispatch.
//!
//! `EmailService::dispatch` sends one message through the configured
//! provider. When the message belongs to a stored communication, the
//! communication row records the outcome (`sent` with the provider id, or
//! `failed`) and a successful send is added to the activity log.

pub mod provider;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::models::{ActivityKind, CommunicationStatus, EmailTemplate, NewActivity, NewCommunication};
use crate::repo::{ActivityRepo, CommunicationRepo};
use crate::template::{self, TemplateValues};

pub use provider::{EmailError, EmailMessage, EmailProvider, HttpEmailProvider, RecordingProvider};

#[derive(Debug, Clone, Default)]
pub struct EmailRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub template_id: Option<String>,
    pub communication_id: Option<String>,
    pub student_id: Option<String>,
}

impl EmailRequest {
    pub fn validate(&self) -> Result<(), EmailError> {
        if self.to.is_empty() {
            return Err(EmailError::NoRecipients);
        }
        match self
            .to
            .iter()
            .find(|addr| !addr.contains('@') || addr.starts_with('@') || addr.ends_with('@'))
        {
            Some(bad) => Err(EmailError::InvalidRecipient(bad.clone())),
            None => Ok(()),
        }
    }
}

/// Subject and body of an email template with `values` filled in.
pub fn render_template(template: &EmailTemplate, values: &TemplateValues) -> (String, String) {
    (
        template::substitute(&template.subject, values),
        template::substitute(&template.body, values),
    )
}

#[derive(Clone)]
pub struct EmailService {
    provider: Arc<dyn EmailProvider>,
    from: String,
}

impl EmailService {
    pub fn new(provider: Arc<dyn EmailProvider>, from: &str) -> Self {
        Self {
            provider,
            from: from.to_string(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Send one email and return the provider message id.
    pub async fn dispatch(&self, backend: &dyn Backend, request: &EmailRequest) -> Result<String> {
        if let Err(e) = request.validate() {
            warn!(error = %e, "Email request rejected");
            mark_failed(backend, request.communication_id.as_deref()).await;
            return Err(e.into());
        }
        let message = EmailMessage {
            from: self.from.clone(),
            to: request.to.clone(),
            subject: request.subject.clone(),
            html: request.html.clone(),
        };

        let message_id = match self.provider.send(&message).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, recipients = ?request.to, "Email provider failed");
                mark_failed(backend, request.communication_id.as_deref()).await;
                return Err(anyhow::Error::new(e).context("Failed to send email"));
            }
        };

        if let Some(communication_id) = request.communication_id.as_deref() {
            CommunicationRepo::new(backend)
                .mark_sent(communication_id, &message_id, Utc::now())
                .await
                .context("Email sent but the communication could not be updated")?;

            let mut activity = NewActivity::new(
                ActivityKind::EmailSent,
                format!("Email sent: {}", request.subject),
            )
            .communication(communication_id)
            .meta("recipients", request.to.len())
            .meta("provider_message_id", message_id.as_str());
            if let Some(template_id) = request.template_id.as_deref() {
                activity = activity.meta("template_id", template_id);
            }
            if let Some(student_id) = request.student_id.as_deref() {
                activity = activity.student(student_id);
            }
            ActivityRepo::new(backend).log(&activity).await?;
        }

        info!(message_id = %message_id, recipients = request.to.len(), "Email sent");
        Ok(message_id)
    }

    /// Store the message as a queued communication, then dispatch it.
    pub async fn send_recorded(&self, backend: &dyn Backend, mut request: EmailRequest) -> Result<String> {
        request.validate()?;
        let communication = CommunicationRepo::new(backend)
            .insert(&NewCommunication {
                subject: request.subject.clone(),
                body: request.html.clone(),
                recipients: request.to.clone(),
                student_id: request.student_id.clone(),
                template_id: request.template_id.clone(),
                status: CommunicationStatus::Queued,
            })
            .await?;
        request.communication_id = Some(communication.id);
        self.dispatch(backend, &request).await
    }
}

// The original error is what the caller sees; a failed status update is only logged.
async fn mark_failed(backend: &dyn Backend, communication_id: Option<&str>) {
    let Some(communication_id) = communication_id else {
        return;
    };
    if let Err(mark_err) = CommunicationRepo::new(backend)
        .mark_failed(communication_id)
        .await
    {
        let mark_err = format!("{:#}", mark_err);
        warn!(
            communication_id = communication_id,
            error = %mark_err,
            "Could not mark communication as failed"
        );
    }
}
