//! In-process [`Store`] backed by insertion-ordered maps.
//!
//! Used by the `bedflow` binary for seed replays and by the tests.  Records
//! are kept in a `Vec` with a `HashMap` position index so listing order is
//! the order records were first written.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::Store;
use crate::error::{AllocResult, AllocationError};
use crate::model::{Request, RequestStatus, Resource, ResourceStatus};

#[derive(Debug)]
struct Table<T> {
    rows: Vec<T>,
    positions: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Clone> Table<T> {
    fn upsert(&mut self, id: &str, row: T) {
        match self.positions.get(id) {
            Some(&pos) => self.rows[pos] = row,
            None => {
                self.positions.insert(id.to_string(), self.rows.len());
                self.rows.push(row);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.positions.get(id).map(|&pos| &self.rows[pos])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.positions.get(id).map(|&pos| &mut self.rows[pos])
    }
}

#[derive(Debug, Default)]
struct Tables {
    resources: Table<Resource>,
    requests: Table<Request>,
}

/// Thread-safe, cloneable in-memory store.  Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `resources` and `requests`.
    pub fn with_records(resources: Vec<Resource>, requests: Vec<Request>) -> Self {
        let mut tables = Tables::default();
        for resource in resources {
            let id = resource.id.clone();
            tables.resources.upsert(&id, resource);
        }
        for request in requests {
            let id = request.id.clone();
            tables.requests.upsert(&id, request);
        }
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Look up a persisted bed.
    pub async fn get_resource(&self, id: &str) -> Option<Resource> {
        self.tables.read().await.resources.get(id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_resources(&self) -> AllocResult<Vec<Resource>> {
        Ok(self.tables.read().await.resources.rows.clone())
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> AllocResult<Vec<Request>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .rows
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn get_request(&self, id: &str) -> AllocResult<Option<Request>> {
        Ok(self.tables.read().await.requests.get(id).cloned())
    }

    async fn upsert_resource(&self, resource: &Resource) -> AllocResult<()> {
        debug!(resource_id = %resource.id, status = %resource.status, "Persisting resource");
        self.tables
            .write()
            .await
            .resources
            .upsert(&resource.id, resource.clone());
        Ok(())
    }

    async fn set_resource_status(&self, id: &str, status: ResourceStatus) -> AllocResult<()> {
        let mut tables = self.tables.write().await;
        let resource = tables
            .resources
            .get_mut(id)
            .ok_or_else(|| AllocationError::ResourceNotFound(id.to_string()))?;
        resource.status = status;
        Ok(())
    }

    async fn upsert_request(&self, request: &Request) -> AllocResult<()> {
        debug!(request_id = %request.id, status = %request.status, "Persisting request");
        self.tables
            .write()
            .await
            .requests
            .upsert(&request.id, request.clone());
        Ok(())
    }

    async fn release_occupant(&self, resource_id: &str) -> AllocResult<Option<Request>> {
        let mut tables = self.tables.write().await;
        let occupant = tables.requests.rows.iter_mut().find(|r| {
            r.status == RequestStatus::Served
                && r.assigned_resource_id.as_deref() == Some(resource_id)
        });
        Ok(occupant.map(|request| {
            request.status = RequestStatus::Released;
            debug!(request_id = %request.id, resource_id, "Occupant released");
            request.clone()
        }))
    }

    fn store_type(&self) -> &str {
        "memory"
    }
}
