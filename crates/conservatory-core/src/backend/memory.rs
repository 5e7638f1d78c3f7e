//! Process-local backend with the same contract as the hosted service.
//!
//! Rows live in per-table vectors (insertion order is the natural order),
//! remote functions are plain closures, and uploads are kept in a map.
//! Individual tables can be told to reject inserts so multi-step workflows
//! can be exercised against partial failure.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Backend, BackendError, Query};

type RemoteFn = Arc<dyn Fn(&Value) -> Result<Value, BackendError> + Send + Sync>;

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    functions: HashMap<String, RemoteFn>,
    objects: HashMap<String, Vec<u8>>,
    failing_inserts: HashSet<String>,
}

#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    public_base: Arc<String>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            public_base: Arc::new("memory://storage".to_string()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-operation; the data is still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append rows to a table as-is.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn register_function<F>(&self, name: &str, f: F)
    where
        F: Fn(&Value) -> Result<Value, BackendError> + Send + Sync + 'static,
    {
        self.lock().functions.insert(name.to_string(), Arc::new(f));
    }

    /// Make every subsequent insert into `table` fail with a server error.
    pub fn fail_inserts_into(&self, table: &str) {
        self.lock().failing_inserts.insert(table.to_string());
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(&format!("{}/{}", bucket, path)).cloned()
    }
}

fn with_defaults(row: Value) -> Result<Value, BackendError> {
    let mut map: Map<String, Value> = match row {
        Value::Object(map) => map,
        other => {
            return Err(BackendError::InvalidResponse(format!(
                "Row must be a JSON object, got {}",
                other
            )))
        }
    };
    if map.get("id").map_or(true, Value::is_null) {
        map.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if map.get("created_at").map_or(true, Value::is_null) {
        map.insert(
            "created_at".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }
    Ok(Value::Object(map))
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let state = self.lock();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        query.arrange(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let mut state = self.lock();
        if state.failing_inserts.contains(table) {
            return Err(BackendError::ServerError(format!(
                "insert into {} rejected",
                table
            )));
        }
        let row = with_defaults(row)?;
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let Value::Object(patch) = patch else {
            return Err(BackendError::InvalidResponse(
                "Patch must be a JSON object".to_string(),
            ));
        };
        let mut state = self.lock();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(map) = &mut *row {
                    for (k, v) in &patch {
                        map.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        let mut state = self.lock();
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| !query.matches(r));
        }
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError> {
        let f = self
            .lock()
            .functions
            .get(function)
            .cloned()
            .ok_or_else(|| BackendError::Rpc {
                function: function.to_string(),
                message: "function not registered".to_string(),
            })?;
        f(&args)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BackendError> {
        let key = format!("{}/{}", bucket, path);
        self.lock().objects.insert(key.clone(), bytes);
        Ok(format!("{}/{}", self.public_base, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_created_at() {
        let backend = InMemoryBackend::new();
        let row = backend
            .insert("students", json!({"first_name": "Ada"}))
            .await
            .unwrap();
        assert!(row["id"].as_str().is_some());
        assert!(row["created_at"].as_str().is_some());
        assert_eq!(backend.rows("students").len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let backend = InMemoryBackend::new();
        backend.seed(
            "contracts",
            vec![json!({"id": "c1", "status": "draft"}), json!({"id": "c2", "status": "draft"})],
        );

        let updated = backend
            .update("contracts", &Query::by_id("c1"), json!({"status": "sent"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(backend.rows("contracts")[0]["status"], "sent");

        backend.delete("contracts", &Query::by_id("c2")).await.unwrap();
        assert_eq!(backend.rows("contracts").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_inserts() {
        let backend = InMemoryBackend::new();
        backend.fail_inserts_into("documents");
        let err = backend.insert("documents", json!({})).await.unwrap_err();
        assert!(matches!(err, BackendError::ServerError(_)));
        assert!(backend.rows("documents").is_empty());
    }

    #[tokio::test]
    async fn test_rpc_unregistered() {
        let backend = InMemoryBackend::new();
        backend.register_function("answer", |_| Ok(json!(42)));
        assert_eq!(backend.rpc("answer", json!({})).await.unwrap(), json!(42));
        assert!(matches!(
            backend.rpc("missing", json!({})).await,
            Err(BackendError::Rpc { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_returns_url() {
        let backend = InMemoryBackend::new();
        let url = backend
            .upload("template-images", "x.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(url.ends_with("template-images/x.png"));
        assert_eq!(backend.object("template-images", "x.png"), Some(vec![1, 2, 3]));
    }
}
