//! Compensating sequence for multi-step writes.
//!
//! The backend offers no multi-statement transactions, so workflows that
//! insert several rows register an undo action after each successful
//! write. On failure the undo actions run newest-first; a failed undo is
//! logged and the remaining ones still run.

use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::backend::{Backend, BackendError, Query};
use crate::repo;

type Compensation<'a> = (String, BoxFuture<'a, Result<(), BackendError>>);

pub struct Saga<'a> {
    name: &'static str,
    backend: &'a dyn Backend,
    compensations: Vec<Compensation<'a>>,
}

/// Outcome of a rollback, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub undone: Vec<String>,
    pub failed: Vec<String>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str, backend: &'a dyn Backend) -> Self {
        Self {
            name,
            backend,
            compensations: Vec::new(),
        }
    }

    pub fn backend(&self) -> &'a dyn Backend {
        self.backend
    }

    pub fn len(&self) -> usize {
        self.compensations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compensations.is_empty()
    }

    /// Register an arbitrary undo action.
    pub fn on_rollback(
        &mut self,
        label: impl Into<String>,
        undo: BoxFuture<'a, Result<(), BackendError>>,
    ) {
        self.compensations.push((label.into(), undo));
    }

    /// Insert a row and register its deletion as the compensation.
    pub async fn insert<T: DeserializeOwned, N: Serialize>(
        &mut self,
        table: &'static str,
        new: &N,
    ) -> anyhow::Result<T> {
        let row: Value = self
            .backend
            .insert(table, repo::encode(new)?)
            .await
            .map_err(|e| anyhow::Error::new(e).context(format!("Failed to insert into {}", table)))?;

        if let Some(id) = row.get("id").and_then(Value::as_str).map(str::to_string) {
            let backend = self.backend;
            debug!(saga = self.name, table = table, id = %id, "Step committed");
            self.on_rollback(
                format!("{} {}", table, id),
                Box::pin(async move { backend.delete(table, &Query::by_id(&id)).await }),
            );
        } else {
            warn!(saga = self.name, table = table, "Inserted row has no id; it cannot be compensated");
        }
        repo::decode_row(table, row)
    }

    /// Keep every write; drop the compensations.
    pub fn commit(self) {
        debug!(saga = self.name, steps = self.compensations.len(), "Saga committed");
    }

    /// Undo every registered step, newest first.
    pub async fn rollback(self) -> RollbackReport {
        let mut report = RollbackReport::default();
        for (label, undo) in self.compensations.into_iter().rev() {
            match undo.await {
                Ok(()) => {
                    debug!(saga = self.name, step = %label, "Compensated");
                    report.undone.push(label);
                }
                Err(e) => {
                    error!(saga = self.name, step = %label, error = %e, "Compensation failed; row left behind");
                    report.failed.push(label);
                }
            }
        }
        warn!(
            saga = self.name,
            undone = report.undone.len(),
            failed = report.failed.len(),
            "Saga rolled back"
        );
        report
    }

    /// Commit if `result` is Ok, otherwise roll back; the result passes through.
    pub async fn finish<T>(self, result: anyhow::Result<T>) -> anyhow::Result<T> {
        match result {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(saga = self.name, error = %message, "Saga step failed");
                self.rollback().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_rollback_deletes_in_reverse() {
        let backend = InMemoryBackend::new();
        let mut saga = Saga::new("test", &backend);
        let a: Value = saga.insert("parents", &json!({"first_name": "A"})).await.unwrap();
        let b: Value = saga.insert("students", &json!({"first_name": "B"})).await.unwrap();
        assert_eq!(saga.len(), 2);

        let report = saga.rollback().await;
        assert_eq!(
            report.undone,
            vec![
                format!("students {}", b["id"].as_str().unwrap()),
                format!("parents {}", a["id"].as_str().unwrap()),
            ]
        );
        assert!(backend.rows("parents").is_empty());
        assert!(backend.rows("students").is_empty());
    }

    async fn two_inserts(saga: &mut Saga<'_>) -> anyhow::Result<String> {
        let contract: Value = saga.insert("contracts", &json!({"n": 1})).await?;
        let _: Value = saga.insert("documents", &json!({"n": 2})).await?;
        Ok(contract["id"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn test_finish_commits_on_success() {
        let backend = InMemoryBackend::new();
        let mut saga = Saga::new("ok", &backend);
        let result = two_inserts(&mut saga).await;
        let id = saga.finish(result).await.unwrap();
        assert_eq!(backend.rows("contracts")[0]["id"], json!(id));
        assert_eq!(backend.rows("documents").len(), 1);
    }

    #[tokio::test]
    async fn test_finish_rolls_back_on_failure() {
        let backend = InMemoryBackend::new();
        backend.fail_inserts_into("documents");
        let mut saga = Saga::new("fails", &backend);
        let result = two_inserts(&mut saga).await;
        assert!(saga.finish(result).await.is_err());
        assert!(backend.rows("contracts").is_empty());
    }

    #[tokio::test]
    async fn test_failed_compensation_reported() {
        let backend = InMemoryBackend::new();
        let mut saga = Saga::new("test", &backend);
        saga.on_rollback(
            "always fails",
            Box::pin(async { Err(BackendError::ServerError("down".into())) }),
        );
        saga.on_rollback("ok", Box::pin(async { Ok(()) }));
        let report = saga.rollback().await;
        assert_eq!(report.undone, vec!["ok".to_string()]);
        assert_eq!(report.failed, vec!["always fails".to_string()]);
    }
}
