//! Remote computed values: tuition, registration fee, contract numbers.
//!
//! These are opaque functions on the backend. Numeric results may come
//! back as JSON numbers or as numeric strings depending on the column
//! type, so both are accepted.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::backend::{functions, Backend, BackendError};
use crate::models::Division;

pub struct RemoteFunctions<'a> {
    backend: &'a dyn Backend,
}

fn as_amount(function: &str, value: &Value) -> Result<f64, BackendError> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        // Scalar functions sometimes come back wrapped as a single-row array
        Value::Array(rows) if rows.len() == 1 => return as_amount(function, &rows[0]),
        _ => None,
    };
    match amount {
        Some(a) if a.is_finite() && a >= 0.0 => Ok(a),
        _ => Err(BackendError::Rpc {
            function: function.to_string(),
            message: format!("expected a non-negative amount, got {}", value),
        }),
    }
}

impl<'a> RemoteFunctions<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    async fn amount(&self, function: &str, division: Division) -> Result<f64> {
        let value = self
            .backend
            .rpc(function, json!({ "p_division": division.as_str() }))
            .await
            .with_context(|| format!("Failed to look up {} for {}", function, division))?;
        Ok(as_amount(function, &value)?)
    }

    pub async fn monthly_tuition(&self, division: Division) -> Result<f64> {
        self.amount(functions::MONTHLY_TUITION, division).await
    }

    pub async fn registration_fee(&self, division: Division) -> Result<f64> {
        self.amount(functions::REGISTRATION_FEE, division).await
    }

    pub async fn next_contract_number(&self) -> Result<String> {
        let value = self
            .backend
            .rpc(functions::CONTRACT_NUMBER, json!({}))
            .await
            .context("Failed to generate contract number")?;
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(BackendError::Rpc {
                function: functions::CONTRACT_NUMBER.to_string(),
                message: format!("expected a contract number, got {}", other),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    #[tokio::test]
    async fn test_amounts_accept_numbers_and_strings() {
        let backend = InMemoryBackend::new();
        backend.register_function(functions::MONTHLY_TUITION, |args| {
            assert_eq!(args["p_division"], "Pre-Professional");
            Ok(json!("325.50"))
        });
        backend.register_function(functions::REGISTRATION_FEE, |_| Ok(json!([75])));
        let f = RemoteFunctions::new(&backend);

        assert_eq!(f.monthly_tuition(Division::PreProfessional).await.unwrap(), 325.5);
        assert_eq!(f.registration_fee(Division::PreProfessional).await.unwrap(), 75.0);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let backend = InMemoryBackend::new();
        backend.register_function(functions::MONTHLY_TUITION, |_| Ok(json!(-5)));
        let err = RemoteFunctions::new(&backend)
            .monthly_tuition(Division::Professional)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("get_monthly_tuition"));
    }

    #[tokio::test]
    async fn test_contract_number() {
        let backend = InMemoryBackend::new();
        backend.register_function(functions::CONTRACT_NUMBER, |_| Ok(json!("CN-2026-0042")));
        assert_eq!(
            RemoteFunctions::new(&backend).next_contract_number().await.unwrap(),
            "CN-2026-0042"
        );

        backend.register_function(functions::CONTRACT_NUMBER, |_| Ok(json!(null)));
        assert!(RemoteFunctions::new(&backend).next_contract_number().await.is_err());
    }
}
