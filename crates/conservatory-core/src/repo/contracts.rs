use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::backend::{tables, Backend, Filter, Query};
use crate::models::{Contract, ContractStatus, NewContract, Signer};

use super::{insert, select, select_one, update_one};

const OPEN_STATUSES: [ContractStatus; 3] = [
    ContractStatus::Draft,
    ContractStatus::Sent,
    ContractStatus::PartiallySigned,
];

pub struct ContractRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ContractRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, id: &str) -> Result<Contract> {
        select_one(self.backend, tables::CONTRACTS, id).await
    }

    pub async fn list(&self) -> Result<Vec<Contract>> {
        select(
            self.backend,
            tables::CONTRACTS,
            &Query::new().order_desc("created_at"),
        )
        .await
    }

    pub async fn for_student(&self, student_id: &str) -> Result<Vec<Contract>> {
        let query = Query::new()
            .eq("student_id", student_id)
            .order_desc("created_at");
        select(self.backend, tables::CONTRACTS, &query).await
    }

    /// Open contracts with at least one signature timestamp missing,
    /// newest first.
    pub async fn awaiting_signatures(&self) -> Result<Vec<Contract>> {
        let query = Query::new()
            .in_list("status", OPEN_STATUSES.iter().map(|s| json!(s)))
            .any_of(
                Signer::ALL
                    .iter()
                    .map(|s| Filter::IsNull(s.date_column().to_string()))
                    .collect(),
            )
            .order_desc("created_at");
        select(self.backend, tables::CONTRACTS, &query).await
    }

    pub async fn insert(&self, contract: &NewContract) -> Result<Contract> {
        insert(self.backend, tables::CONTRACTS, contract).await
    }

    /// Store a signature image and timestamp for one signer and recompute
    /// the contract status.
    pub async fn record_signature(
        &self,
        id: &str,
        signer: Signer,
        image: &str,
        signed_at: DateTime<Utc>,
        student_signs: bool,
    ) -> Result<Contract> {
        let mut contract = self.get(id).await?;
        match signer {
            Signer::Parent => contract.parent_signature_date = Some(signed_at),
            Signer::Student => contract.student_signature_date = Some(signed_at),
            Signer::Director => contract.director_signature_date = Some(signed_at),
        }
        let status = contract.status_from_signatures(student_signs);

        let mut patch = serde_json::Map::new();
        patch.insert(signer.date_column().to_string(), json!(signed_at));
        patch.insert(signer.image_column().to_string(), json!(image));
        patch.insert("status".to_string(), json!(status));
        update_one(self.backend, tables::CONTRACTS, id, patch.into()).await
    }

    pub async fn set_status(&self, id: &str, status: ContractStatus) -> Result<Contract> {
        update_one(self.backend, tables::CONTRACTS, id, json!({ "status": status })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn row(id: &str, status: &str, parent: bool, director: bool, created: &str) -> serde_json::Value {
        let parent_signed = if parent { json!("2026-09-02T00:00:00Z") } else { json!(null) };
        let director_signed = if director { json!("2026-09-03T00:00:00Z") } else { json!(null) };
        json!({
            "id": id,
            "contract_number": format!("C-{id}"),
            "student_id": "s1",
            "template_id": "t1",
            "season": "2026-2027",
            "monthly_tuition": 450.0,
            "registration_fee": 100.0,
            "start_date": "2026-09-01",
            "end_date": "2027-09-01",
            "status": status,
            "parent_signature_date": parent_signed,
            "student_signature_date": null,
            "director_signature_date": director_signed,
            "created_at": created
        })
    }

    #[tokio::test]
    async fn test_awaiting_signatures_excludes_closed() {
        let backend = InMemoryBackend::new();
        backend.seed(
            tables::CONTRACTS,
            vec![
                row("c1", "sent", false, false, "2026-09-01T00:00:00Z"),
                row("c2", "cancelled", false, false, "2026-09-02T00:00:00Z"),
                row("c3", "partially_signed", true, false, "2026-09-03T00:00:00Z"),
            ],
        );
        let ids: Vec<_> = ContractRepo::new(&backend)
            .awaiting_signatures()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c3", "c1"]);
    }

    #[tokio::test]
    async fn test_record_signature_updates_status() {
        let backend = InMemoryBackend::new();
        backend.seed(
            tables::CONTRACTS,
            vec![row("c1", "sent", true, false, "2026-09-01T00:00:00Z")],
        );
        let repo = ContractRepo::new(&backend);
        let signed_at = "2026-09-10T15:00:00Z".parse().unwrap();

        let contract = repo
            .record_signature("c1", Signer::Director, "data:image/png;base64,AA==", signed_at, false)
            .await
            .unwrap();
        assert_eq!(contract.status, ContractStatus::Executed);
        assert_eq!(contract.director_signature_date, Some(signed_at));
        assert_eq!(
            contract.director_signature.as_deref(),
            Some("data:image/png;base64,AA==")
        );
    }
}
