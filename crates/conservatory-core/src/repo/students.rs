use anyhow::Result;
use serde_json::json;

use crate::backend::{tables, Backend, Query};
use crate::models::{NewParent, NewStudent, Parent, Student, StudentStatus};

use super::{insert, select, select_one, update_one};

pub struct StudentRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> StudentRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// All students, optionally limited to one status, ordered by last name.
    pub async fn list(&self, status: Option<StudentStatus>) -> Result<Vec<Student>> {
        let mut query = Query::new();
        if let Some(status) = status {
            query = query.eq("status", json!(status));
        }
        let query = query.order_asc("last_name").order_asc("first_name");
        select(self.backend, tables::STUDENTS, &query).await
    }

    pub async fn get(&self, id: &str) -> Result<Student> {
        select_one(self.backend, tables::STUDENTS, id).await
    }

    /// The student and its parent, fetched one after the other.
    pub async fn get_with_parent(&self, id: &str) -> Result<(Student, Option<Parent>)> {
        let student = self.get(id).await?;
        let parent = match student.parent_id.as_deref() {
            Some(parent_id) => Some(ParentRepo::new(self.backend).get(parent_id).await?),
            None => None,
        };
        Ok((student, parent))
    }

    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<Student>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().in_list("id", ids.iter().cloned());
        select(self.backend, tables::STUDENTS, &query).await
    }

    pub async fn insert(&self, student: &NewStudent) -> Result<Student> {
        student.validate().map_err(anyhow::Error::msg)?;
        insert(self.backend, tables::STUDENTS, student).await
    }

    pub async fn set_status(&self, id: &str, status: StudentStatus) -> Result<Student> {
        update_one(self.backend, tables::STUDENTS, id, json!({ "status": status })).await
    }
}

pub struct ParentRepo<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ParentRepo<'a> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    pub async fn get(&self, id: &str) -> Result<Parent> {
        select_one(self.backend, tables::PARENTS, id).await
    }

    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<Parent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().in_list("id", ids.iter().cloned());
        select(self.backend, tables::PARENTS, &query).await
    }

    pub async fn insert(&self, parent: &NewParent) -> Result<Parent> {
        parent.validate().map_err(anyhow::Error::msg)?;
        insert(self.backend, tables::PARENTS, parent).await
    }
}
