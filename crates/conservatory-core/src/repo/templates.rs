use anyhow::Result;
use serde_json::json;

use crate::backend::{tables, Backend, Filter, Query};
use crate::models::{ContractTemplate, Division, EmailTemplate, NewEmailTemplate};

use super::{insert, select, select_one, update_one};

pub struct ContractTemplateRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ContractTemplateRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Active templates usable for `division` (division-specific or generic).
    pub async fn list_active(&self, division: Option<Division>) -> Result<Vec<ContractTemplate>> {
        let mut query = Query::new().eq("is_active", true);
        if let Some(division) = division {
            query = query.any_of(vec![
                Filter::Eq("division".into(), json!(division)),
                Filter::IsNull("division".into()),
            ]);
        }
        select(self.backend, tables::CONTRACT_TEMPLATES, &query.order_asc("name")).await
    }

    pub async fn get(&self, id: &str) -> Result<ContractTemplate> {
        select_one(self.backend, tables::CONTRACT_TEMPLATES, id).await
    }
}

pub struct EmailTemplateRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> EmailTemplateRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self) -> Result<Vec<EmailTemplate>> {
        select(
            self.backend,
            tables::EMAIL_TEMPLATES,
            &Query::new().order_asc("name"),
        )
        .await
    }

    pub async fn get(&self, id: &str) -> Result<EmailTemplate> {
        select_one(self.backend, tables::EMAIL_TEMPLATES, id).await
    }

    pub async fn insert(&self, template: &NewEmailTemplate) -> Result<EmailTemplate> {
        insert(self.backend, tables::EMAIL_TEMPLATES, template).await
    }

    pub async fn set_image_url(&self, id: &str, url: &str) -> Result<EmailTemplate> {
        update_one(
            self.backend,
            tables::EMAIL_TEMPLATES,
            id,
            json!({ "image_url": url }),
        )
        .await
    }
}
