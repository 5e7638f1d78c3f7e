use anyhow::Result;
use tracing::debug;

use crate::backend::{tables, Backend, Query};
use crate::models::{Activity, NewActivity};

use super::{insert, select};

pub struct ActivityRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ActivityRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Append an entry to the audit log.
    pub async fn log(&self, activity: &NewActivity) -> Result<Activity> {
        debug!(kind = ?activity.kind, description = %activity.description, "Logging activity");
        insert(self.backend, tables::ACTIVITIES, activity).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Activity>> {
        let query = Query::new().order_desc("created_at").limit(limit);
        select(self.backend, tables::ACTIVITIES, &query).await
    }

    pub async fn for_student(&self, student_id: &str) -> Result<Vec<Activity>> {
        let query = Query::new()
            .eq("student_id", student_id)
            .order_desc("created_at");
        select(self.backend, tables::ACTIVITIES, &query).await
    }
}
