//! Seed and replay files.
//!
//! A seed file is a JSON document with the initial beds, the persisted
//! requests and an ordered list of events to replay against a service:
//!
//! ```json
//! {
//!   "resources": [{"id": "ICU-1", "location": "I101", "category": "ICU", "status": "FREE"}],
//!   "requests": [],
//!   "events": [
//!     {"op": "admit", "request": {"id": "P1", "name": "Ada", "priority": 9, "requiredCategory": "ICU"}},
//!     {"op": "release", "resourceId": "ICU-1"}
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::Decision;
use crate::error::AllocResult;
use crate::model::{Request, Resource};
use crate::service::{AllocationService, NewRequest};
use crate::store::MemoryStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub resources: Vec<Resource>,
    pub requests: Vec<Request>,
    pub events: Vec<SeedEvent>,
}

/// One replayable protocol call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SeedEvent {
    Admit { request: NewRequest },
    Release { resource_id: String },
    AddResource { resource: Resource },
    Allocate { request_id: String },
}

impl SeedEvent {
    /// Apply this event to `service`.
    pub async fn apply(self, service: &AllocationService) -> AllocResult<Decision> {
        match self {
            Self::Admit { request } => service.admit(request).await,
            Self::Release { resource_id } => service.release(&resource_id).await,
            Self::AddResource { resource } => service.add_resource(resource).await,
            Self::Allocate { request_id } => service.manual_allocate(&request_id).await,
        }
    }
}

impl SeedFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse seed {}", path.display()))
    }

    /// Move the initial records into a fresh [`MemoryStore`], leaving the events.
    pub fn into_store(self) -> (MemoryStore, Vec<SeedEvent>) {
        (MemoryStore::with_records(self.resources, self.requests), self.events)
    }
}
