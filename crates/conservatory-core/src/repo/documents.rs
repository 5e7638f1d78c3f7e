use anyhow::Result;
use serde_json::json;

use crate::backend::{tables, Backend, Query};
use crate::models::{Document, DocumentStatus, NewDocument};

use super::{insert, select, select_one, update_one};

pub struct DocumentRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> DocumentRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, id: &str) -> Result<Document> {
        select_one(self.backend, tables::DOCUMENTS, id).await
    }

    /// Documents still in draft or sent, newest first.
    pub async fn pending(&self) -> Result<Vec<Document>> {
        let query = Query::new()
            .in_list(
                "status",
                [json!(DocumentStatus::Draft), json!(DocumentStatus::Sent)],
            )
            .order_desc("created_at");
        select(self.backend, tables::DOCUMENTS, &query).await
    }

    pub async fn for_contract(&self, contract_id: &str) -> Result<Vec<Document>> {
        let query = Query::new()
            .eq("contract_id", contract_id)
            .order_desc("created_at");
        select(self.backend, tables::DOCUMENTS, &query).await
    }

    pub async fn insert(&self, document: &NewDocument) -> Result<Document> {
        insert(self.backend, tables::DOCUMENTS, document).await
    }

    pub async fn set_status(&self, id: &str, status: DocumentStatus) -> Result<Document> {
        update_one(self.backend, tables::DOCUMENTS, id, json!({ "status": status })).await
    }
}
