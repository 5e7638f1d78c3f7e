//! Data-access repositories, one per entity.
//!
//! Each repository borrows a `Backend` and converts between backend JSON
//! and the typed records in `crate::models`. Decoding happens here and
//! nowhere else; a row that does not match its record type is an error
//! naming the table, not a silently defaulted value.
//!
//! `Resource<T>` carries the loading/error state a view needs while a
//! repository call is in flight.

pub mod activities;
pub mod communications;
pub mod contracts;
pub mod documents;
pub mod payments;
pub mod rates;
pub mod students;
pub mod templates;

use std::future::Future;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::backend::{Backend, BackendError, Query};

pub use activities::ActivityRepo;
pub use communications::CommunicationRepo;
pub use contracts::ContractRepo;
pub use documents::DocumentRepo;
pub use payments::{PaymentCategoryRepo, PaymentScheduleRepo, TuitionRateRepo};
pub use rates::RemoteFunctions;
pub use students::{ParentRepo, StudentRepo};
pub use templates::{ContractTemplateRepo, EmailTemplateRepo};

/// Loading/error state of a fetched value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Resource<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> Resource<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Resource::Loaded(value),
            Err(e) => Resource::Failed(format!("{:#}", e)),
        }
    }

    /// Await a repository call and capture its outcome.
    pub async fn load<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>>,
    {
        Self::from_result(fut.await)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resource::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

pub(crate) fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T> {
    serde_json::from_value(row).with_context(|| format!("Failed to decode {} row", table))
}

pub(crate) fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(|row| decode_row(table, row)).collect()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to encode row")
}

pub(crate) async fn select<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: &str,
    query: &Query,
) -> Result<Vec<T>> {
    let rows = backend
        .select(table, query)
        .await
        .with_context(|| format!("Failed to fetch {}", table))?;
    decode_rows(table, rows)
}

pub(crate) async fn select_one<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: &str,
    id: &str,
) -> Result<T> {
    let row = backend
        .select(table, &Query::by_id(id).limit(1))
        .await
        .with_context(|| format!("Failed to fetch {} {}", table, id))?
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(format!("{} {}", table, id)))?;
    decode_row(table, row)
}

pub(crate) async fn insert<T: DeserializeOwned, N: Serialize>(
    backend: &dyn Backend,
    table: &str,
    new: &N,
) -> Result<T> {
    let row = backend
        .insert(table, encode(new)?)
        .await
        .with_context(|| format!("Failed to insert into {}", table))?;
    decode_row(table, row)
}

pub(crate) async fn update_one<T: DeserializeOwned>(
    backend: &dyn Backend,
    table: &str,
    id: &str,
    patch: Value,
) -> Result<T> {
    let row = backend
        .update(table, &Query::by_id(id), patch)
        .await
        .with_context(|| format!("Failed to update {} {}", table, id))?
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(format!("{} {}", table, id)))?;
    decode_row(table, row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resource_load() {
        let ok: Resource<u32> = Resource::load(async { Ok(3) }).await;
        assert_eq!(ok.data(), Some(&3));
        assert!(ok.error().is_none());

        let failed: Resource<u32> =
            Resource::load(async { Err::<u32, _>(anyhow::anyhow!("boom")).context("Loading students") })
                .await;
        assert_eq!(failed.error(), Some("Loading students: boom"));
        assert!(failed.data().is_none());
    }

    #[test]
    fn test_decode_error_names_table() {
        let err = decode_row::<crate::models::Student>("students", serde_json::json!({"id": 1}))
            .unwrap_err();
        assert!(err.to_string().contains("students"));
    }
}
