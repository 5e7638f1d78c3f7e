//! Access to the hosted relational backend.
//!
//! The `Backend` trait is the only seam between this crate and the managed
//! service: table reads and writes, remote functions, and object storage.
//! Rows cross it as JSON and are decoded into typed records by the
//! repositories in `crate::repo`.
//!
//! - `RestBackend`: PostgREST/storage HTTP client used in production
//! - `InMemoryBackend`: process-local tables used by tests and demos

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

pub use error::BackendError;
pub use memory::InMemoryBackend;
pub use query::{Filter, Order, Query};
pub use rest::RestBackend;

/// Table names as they exist in the backend schema.
pub mod tables {
    pub const STUDENTS: &str = "students";
    pub const PARENTS: &str = "parents";
    pub const CONTRACTS: &str = "contracts";
    pub const CONTRACT_TEMPLATES: &str = "contract_templates";
    pub const DOCUMENTS: &str = "documents";
    pub const PAYMENT_SCHEDULES: &str = "payment_schedules";
    pub const PAYMENT_CATEGORIES: &str = "payment_categories";
    pub const TUITION_RATES: &str = "tuition_rates";
    pub const ACTIVITIES: &str = "activities";
    pub const COMMUNICATIONS: &str = "communications";
    pub const EMAIL_TEMPLATES: &str = "email_templates";
}

/// Remote function names.
pub mod functions {
    pub const MONTHLY_TUITION: &str = "get_monthly_tuition";
    pub const REGISTRATION_FEE: &str = "get_registration_fee";
    pub const CONTRACT_NUMBER: &str = "generate_contract_number";
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows of `table` matching `query`, in query order.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Insert one row and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError>;

    /// Patch every row matching `query`, returning the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value)
        -> Result<Vec<Value>, BackendError>;

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError>;

    /// Call a remote function with named arguments.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, BackendError>;

    /// Upload an object and return its public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;
}
