//! HTTP client for the hosted backend (PostgREST tables, RPC, auth, storage).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::SessionData;

use super::{Backend, BackendError, Query};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// No retries are attempted; a request that exceeds this fails the action.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const REST_PATH: &str = "rest/v1";
const AUTH_PATH: &str = "auth/v1";
const STORAGE_PATH: &str = "storage/v1";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

/// Backend client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            token: Some(token),
        }
    }

    /// Sign in with email and password and return session data
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = format!("{}/{}/token?grant_type=password", self.base_url, AUTH_PATH);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .context("Failed to parse auth response")?;

        Ok(SessionData {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            user_id: auth.user.id,
            email: auth.user.email.unwrap_or_else(|| email.to_string()),
            expires_in_secs: auth.expires_in,
            created_at: Utc::now(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::from_status(status, &body))
        }
    }

    async fn json_rows(response: reqwest::Response, url: &str) -> Result<Vec<Value>, BackendError> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(other) => Ok(vec![other]),
            Err(e) => Err(BackendError::InvalidResponse(format!(
                "Failed to parse JSON response from {}: {}",
                url, e
            ))),
        }
    }

    /// Public URL of an object in a public bucket.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/{}/object/public/{}/{}",
            self.base_url, STORAGE_PATH, bucket, path
        )
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table);
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(query.to_params());
        debug!(table = table, params = ?params, "select");

        let response = self
            .authorize(self.client.get(&url))
            .query(&params)
            .send()
            .await?;
        Self::json_rows(response, &url).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let url = self.table_url(table);
        debug!(table = table, "insert");

        let response = self
            .authorize(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::json_rows(response, &url)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse(format!("Insert into {} returned no row", table)))
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table);
        debug!(table = table, "update");

        let response = self
            .authorize(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .query(&query.to_params())
            .json(&patch)
            .send()
            .await?;
        Self::json_rows(response, &url).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        let url = self.table_url(table);
        debug!(table = table, "delete");

        let response = self
            .authorize(self.client.delete(&url))
            .query(&query.to_params())
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        let url = format!("{}/{}/rpc/{}", self.base_url, REST_PATH, function);
        debug!(function = function, "rpc");

        let response = self
            .authorize(self.client.post(&url))
            .json(&args)
            .send()
            .await?;
        let response = Self::check_response(response)
            .await
            .map_err(|e| BackendError::Rpc {
                function: function.to_string(),
                message: e.to_string(),
            })?;
        let value = response.json::<Value>().await?;
        Ok(value)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let url = format!("{}/{}/object/{}/{}", self.base_url, STORAGE_PATH, bucket, path);
        debug!(bucket = bucket, path = path, size = bytes.len(), "upload");

        let response = self
            .authorize(self.client.post(&url))
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(self.public_url(bucket, path))
    }
}
