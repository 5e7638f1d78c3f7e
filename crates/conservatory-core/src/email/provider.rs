//! Email delivery providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::BackendError;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Email provider rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Something that can deliver an email and return the provider's message id.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Transactional email API: `POST {api_url}/emails` with a bearer key.
#[derive(Clone)]
pub struct HttpEmailProvider {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailProvider {
    pub fn new(api_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let url = format!("{}/emails", self.api_url);
        debug!(url = %url, recipients = message.to.len(), "Sending email");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                message: BackendError::truncate_body(&body),
            });
        }
        serde_json::from_str::<SendResponse>(&body)
            .map(|r| r.id)
            .map_err(|e| EmailError::InvalidResponse(format!("{}: {}", e, BackendError::truncate_body(&body))))
    }
}

/// Provider that keeps messages in memory instead of sending them.
#[derive(Clone, Default)]
pub struct RecordingProvider {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    reject: Arc<Mutex<Option<String>>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later message with `reason`.
    pub fn reject_with(&self, reason: &str) {
        *self.reject.lock().unwrap_or_else(|p| p.into_inner()) = Some(reason.to_string());
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        if let Some(reason) = self.reject.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(EmailError::Rejected {
                status: 422,
                message: reason,
            });
        }
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        sent.push(message.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}
