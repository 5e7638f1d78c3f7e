use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::backend::{tables, Backend, Query};
use crate::models::{Communication, CommunicationStatus, NewCommunication};

use super::{insert, select, select_one, update_one};

pub struct CommunicationRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> CommunicationRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, id: &str) -> Result<Communication> {
        select_one(self.backend, tables::COMMUNICATIONS, id).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Communication>> {
        let query = Query::new().order_desc("created_at").limit(limit);
        select(self.backend, tables::COMMUNICATIONS, &query).await
    }

    pub async fn insert(&self, communication: &NewCommunication) -> Result<Communication> {
        insert(self.backend, tables::COMMUNICATIONS, communication).await
    }

    pub async fn mark_sent(
        &self,
        id: &str,
        provider_message_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Communication> {
        update_one(
            self.backend,
            tables::COMMUNICATIONS,
            id,
            json!({
                "status": CommunicationStatus::Sent,
                "provider_message_id": provider_message_id,
                "sent_at": sent_at,
            }),
        )
        .await
    }

    pub async fn mark_failed(&self, id: &str) -> Result<Communication> {
        update_one(
            self.backend,
            tables::COMMUNICATIONS,
            id,
            json!({ "status": CommunicationStatus::Failed }),
        )
        .await
    }
}
