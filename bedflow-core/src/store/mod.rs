//! Store Trait - Durable Storage Collaborator
//!
//! The allocation engine never performs I/O.  The service layer persists
//! every decision through a [`Store`], and rebuilds the engine from it on
//! startup.  Any document store able to list records and upsert them by id
//! can implement this trait.
//!
//! # Contract:
//! - Listing returns records in a stable order (insertion order is enough).
//! - Upserts are whole-record overwrites keyed by id.
//! - Failures are reported as [`AllocationError::Store`](crate::AllocationError::Store)
//!   and passed to the caller untouched.

use async_trait::async_trait;

use crate::error::AllocResult;
use crate::model::{Request, RequestStatus, Resource, ResourceStatus};

pub mod memory;

pub use memory::MemoryStore;

/// Persistence interface consumed by [`crate::service::AllocationService`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Every persisted bed.
    async fn list_resources(&self) -> AllocResult<Vec<Resource>>;

    /// Persisted requests, optionally restricted to one status.
    async fn list_requests(&self, status: Option<RequestStatus>) -> AllocResult<Vec<Request>>;

    /// One request by id.
    async fn get_request(&self, id: &str) -> AllocResult<Option<Request>>;

    /// Insert or overwrite a bed.
    async fn upsert_resource(&self, resource: &Resource) -> AllocResult<()>;

    /// Update only the status of a known bed.
    async fn set_resource_status(&self, id: &str, status: ResourceStatus) -> AllocResult<()>;

    /// Insert or overwrite a request.
    async fn upsert_request(&self, request: &Request) -> AllocResult<()>;

    /// Mark the SERVED request holding `resource_id` as RELEASED.
    ///
    /// Returns the released request, or `None` if the bed had no occupant.
    async fn release_occupant(&self, resource_id: &str) -> AllocResult<Option<Request>>;

    /// Short identifier for logs.
    fn store_type(&self) -> &str;
}
