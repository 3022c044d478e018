//! Allocation Service - Serialized Engine Access plus Persistence
//!
//! Wraps one [`AllocationEngine`] for a whole process and keeps a [`Store`]
//! in step with its decisions.
//!
//! # Locking
//! - Mutating protocols take the engine write lock; queries share the read lock.
//! - After deciding, a protocol takes the persistence lane and only then
//!   drops the engine lock.  Store I/O runs under the lane alone, so decisions
//!   reach the store in the order they were made while the engine is already
//!   free for the next caller.
//! - An admission reserves its request id before touching the store and
//!   holds it until the decision is persisted, so a second admission with
//!   the same id is refused even while the first is still in flight.
//! - A crash between decision and persistence leaves the store behind the
//!   engine; the next [`AllocationService::start`] rebuilds from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engine::{AllocationEngine, Decision, SearchCriteria};
use crate::error::{AllocResult, AllocationError};
use crate::metrics::{AllocationMetrics, MetricsSnapshot};
use crate::model::{Category, Request, RequestStatus, Resource};
use crate::store::Store;

/// Admission payload as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub required_category: Category,
    /// Defaults to the time of admission.
    #[serde(default)]
    pub arrival: Option<DateTime<Utc>>,
}

impl NewRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        required_category: impl Into<Category>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            required_category: required_category.into(),
            arrival: None,
        }
    }

    /// Pin the arrival time instead of stamping it on admission.
    pub fn arrived_at(mut self, arrival: DateTime<Utc>) -> Self {
        self.arrival = Some(arrival);
        self
    }

    fn into_request(self) -> Request {
        let arrival = self.arrival.unwrap_or_else(Utc::now);
        Request::new(self.id, self.name, self.priority, self.required_category, arrival)
    }
}

/// Process-wide allocation handle.  Share it as `Arc<AllocationService>`.
pub struct AllocationService {
    engine: RwLock<AllocationEngine>,
    persist_lane: Mutex<()>,
    admitting: std::sync::Mutex<HashSet<String>>,
    store: Arc<dyn Store>,
    metrics: AllocationMetrics,
    config: EngineConfig,
}

impl AllocationService {
    /// Load beds and WAITING requests from `store` and initialize the engine.
    ///
    /// A store failure here is fatal: the engine never runs on partial state.
    pub async fn start(store: Arc<dyn Store>, config: EngineConfig) -> AllocResult<Arc<Self>> {
        info!(store = store.store_type(), "Starting allocation service");
        let resources = store.list_resources().await?;
        let waiting = store.list_requests(Some(RequestStatus::Waiting)).await?;

        let mut engine = AllocationEngine::with_capacity(config.waitlist_capacity);
        engine.initialize(resources, waiting);

        Ok(Arc::new(Self {
            engine: RwLock::new(engine),
            persist_lane: Mutex::new(()),
            admitting: std::sync::Mutex::new(HashSet::new()),
            store,
            metrics: AllocationMetrics::new(),
            config,
        }))
    }

    /// Admit a patient: assign the nearest bed or queue by priority.
    pub async fn admit(&self, new_request: NewRequest) -> AllocResult<Decision> {
        self.validate(&new_request)?;
        let _reservation = self.reserve(&new_request.id)?;
        if self.store.get_request(&new_request.id).await?.is_some() {
            return Err(AllocationError::Duplicate(new_request.id));
        }

        let mut engine = self.engine.write().await;
        if engine.is_waiting(&new_request.id) {
            return Err(AllocationError::Duplicate(new_request.id));
        }
        let started = Instant::now();
        let decision = engine.admit(new_request.into_request())?;
        self.metrics.record(&decision, started.elapsed());

        let _lane = self.hand_off(engine).await;
        self.persist(&decision, Persist::StatusOnly).await?;
        Ok(decision)
    }

    /// Release a bed: discharge its occupant and offer it to the waitlist.
    pub async fn release(&self, resource_id: &str) -> AllocResult<Decision> {
        let mut engine = self.engine.write().await;
        if engine.get_resource(resource_id).is_none() {
            return Err(AllocationError::ResourceNotFound(resource_id.to_string()));
        }
        let started = Instant::now();
        let decision = engine.release(resource_id)?;
        self.metrics.record(&decision, started.elapsed());

        let _lane = self.hand_off(engine).await;
        if let Some(previous) = self.store.release_occupant(resource_id).await? {
            info!(request_id = %previous.id, resource_id, "Previous occupant released");
        }
        self.persist(&decision, Persist::StatusOnly).await?;
        Ok(decision)
    }

    /// Register a new bed; a FREE bed immediately serves the waitlist.
    ///
    /// Bed ids are unique: re-adding a known id is refused, since the bed may
    /// still have an occupant the engine does not track.
    pub async fn add_resource(&self, resource: Resource) -> AllocResult<Decision> {
        if resource.id.trim().is_empty() {
            return Err(AllocationError::Validation("resource id must not be empty".into()));
        }
        let mut engine = self.engine.write().await;
        if engine.get_resource(&resource.id).is_some() {
            warn!(resource_id = %resource.id, "Refusing to re-add a known resource");
            return Err(AllocationError::DuplicateResource(resource.id));
        }
        let started = Instant::now();
        let decision = engine.add_resource(resource)?;
        self.metrics.record(&decision, started.elapsed());

        let _lane = self.hand_off(engine).await;
        self.persist(&decision, Persist::NewResource).await?;
        Ok(decision)
    }

    /// Force-assign a waiting patient, bypassing priority order.
    pub async fn manual_allocate(&self, request_id: &str) -> AllocResult<Decision> {
        let mut engine = self.engine.write().await;
        let started = Instant::now();
        let decision = engine.manual_allocate(request_id)?;
        self.metrics.record(&decision, started.elapsed());

        let _lane = self.hand_off(engine).await;
        self.persist(&decision, Persist::StatusOnly).await?;
        Ok(decision)
    }

    pub async fn list_resources(&self) -> Vec<Resource> {
        self.engine.read().await.list_resources()
    }

    pub async fn filter_resources(&self, criteria: &SearchCriteria) -> Vec<Resource> {
        self.engine.read().await.filter_resources(criteria)
    }

    /// Waiting requests in heap order.
    pub async fn list_waiting(&self) -> Vec<Request> {
        self.engine.read().await.list_waiting()
    }

    /// Waiting requests in service order.
    pub async fn list_waiting_ranked(&self) -> Vec<Request> {
        self.engine.read().await.list_waiting_ranked()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    // ── private helpers ───────────────────────────────────────────────

    fn validate(&self, new_request: &NewRequest) -> AllocResult<()> {
        if new_request.id.trim().is_empty() {
            return Err(AllocationError::Validation("request id must not be empty".into()));
        }
        if !self.config.accepts_priority(new_request.priority) {
            return Err(AllocationError::Validation(format!(
                "priority {} outside {}..={}",
                new_request.priority, self.config.min_priority, self.config.max_priority
            )));
        }
        Ok(())
    }

    /// Claim `id` for the duration of one admission.
    fn reserve(&self, id: &str) -> AllocResult<Reservation<'_>> {
        let mut admitting = self
            .admitting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !admitting.insert(id.to_string()) {
            return Err(AllocationError::Duplicate(id.to_string()));
        }
        Ok(Reservation {
            ids: &self.admitting,
            id: id.to_string(),
        })
    }

    /// Enter the persistence lane, then let go of the engine.
    async fn hand_off(&self, engine: RwLockWriteGuard<'_, AllocationEngine>) -> MutexGuard<'_, ()> {
        let lane = self.persist_lane.lock().await;
        drop(engine);
        lane
    }

    async fn persist(&self, decision: &Decision, mode: Persist) -> AllocResult<()> {
        if let Some(resource) = decision.resource() {
            match mode {
                Persist::NewResource => self.store.upsert_resource(resource).await?,
                Persist::StatusOnly => {
                    self.store
                        .set_resource_status(&resource.id, resource.status)
                        .await?
                }
            }
        }
        if let Some(request) = decision.request() {
            self.store.upsert_request(request).await?;
        }
        Ok(())
    }
}

/// How a decision's bed is written back.
#[derive(Debug, Clone, Copy)]
enum Persist {
    /// Bed already stored; write its status only.
    StatusOnly,
    /// Bed first seen by this decision; write the whole record.
    NewResource,
}

/// Releases an admission id reservation on drop, on every exit path.
struct Reservation<'a> {
    ids: &'a std::sync::Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceStatus;
    use crate::store::MemoryStore;

    async fn service_with(resources: Vec<Resource>) -> (Arc<AllocationService>, MemoryStore) {
        let store = MemoryStore::with_records(resources, Vec::new());
        let service = AllocationService::start(Arc::new(store.clone()), EngineConfig::default())
            .await
            .unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn test_admit_persists_request_and_bed() {
        let (service, store) = service_with(vec![Resource::new("ICU-1", "I1", Category::Icu)]).await;
        let decision = service
            .admit(NewRequest::new("P1", "Ada", 8, Category::Icu))
            .await
            .unwrap();
        assert_eq!(decision.action(), "ADMITTED");

        let persisted = store.get_request("P1").await.unwrap().unwrap();
        assert_eq!(persisted.status, RequestStatus::Served);
        assert_eq!(
            store.get_resource("ICU-1").await.unwrap().status,
            ResourceStatus::Occupied
        );
        assert_eq!(service.metrics().admissions, 1);
    }

    #[tokio::test]
    async fn test_admit_validation() {
        let (service, _) = service_with(Vec::new()).await;
        let err = service
            .admit(NewRequest::new("P1", "Ada", 11, Category::Icu))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Validation(_)));
        let err = service
            .admit(NewRequest::new("  ", "Ada", 5, Category::Icu))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_admit_duplicate_rejected() {
        let (service, _) = service_with(Vec::new()).await;
        service
            .admit(NewRequest::new("P1", "Ada", 5, Category::Icu))
            .await
            .unwrap();
        let err = service
            .admit(NewRequest::new("P1", "Ada again", 5, Category::Icu))
            .await
            .unwrap_err();
        assert_eq!(err, AllocationError::Duplicate("P1".into()));
        assert_eq!(service.list_waiting().await.len(), 1);
    }

    #[tokio::test]
    async fn test_release_discharges_occupant_and_reassigns() {
        let (service, store) = service_with(vec![Resource::new("ICU-1", "I1", Category::Icu)]).await;
        service
            .admit(NewRequest::new("P1", "Ada", 5, Category::Icu))
            .await
            .unwrap();
        service
            .admit(NewRequest::new("P2", "Bo", 5, Category::Icu))
            .await
            .unwrap();

        let decision = service.release("ICU-1").await.unwrap();
        assert_eq!(decision.action(), "REASSIGNED");

        let p1 = store.get_request("P1").await.unwrap().unwrap();
        let p2 = store.get_request("P2").await.unwrap().unwrap();
        assert_eq!(p1.status, RequestStatus::Released);
        assert_eq!(p2.status, RequestStatus::Served);
        assert_eq!(p2.assigned_resource_id.as_deref(), Some("ICU-1"));
    }

    #[tokio::test]
    async fn test_release_unknown() {
        let (service, _) = service_with(Vec::new()).await;
        let err = service.release("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_restart_rebuilds_from_store() {
        let (service, store) = service_with(Vec::new()).await;
        service
            .admit(NewRequest::new("P1", "Ada", 5, Category::General))
            .await
            .unwrap();
        service
            .add_resource(Resource::new("GEN-1", "G1", Category::General).with_status(ResourceStatus::Occupied))
            .await
            .unwrap();
        drop(service);

        let restarted = AllocationService::start(Arc::new(store), EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(restarted.list_waiting().await.len(), 1);
        assert_eq!(restarted.list_resources().await.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_allocate_persists() {
        let (service, store) = service_with(Vec::new()).await;
        service
            .admit(NewRequest::new("P1", "Ada", 2, Category::Emergency))
            .await
            .unwrap();
        assert_eq!(
            service.manual_allocate("P1").await.unwrap().action(),
            "FAILURE"
        );
        assert_eq!(service.metrics().manual_failure, 1);
        assert!(service.manual_allocate("nobody").await.unwrap_err().is_not_found());
        assert_eq!(
            store.get_request("P1").await.unwrap().unwrap().status,
            RequestStatus::Waiting
        );
    }
}
