//! Allocation Engine - Admission, Release and Manual Override
//!
//! The engine is the sole mutator of the [`ResourceIndex`] and the
//! [`PriorityWaitlist`], and keeps the two consistent: a request sits in the
//! waitlist iff it is WAITING, and every bed it hands out is OCCUPIED.
//!
//! The engine performs no I/O and defines no locking.  Callers must serialize
//! every mutating protocol (`initialize`, `admit`, `release`, `add_resource`,
//! `manual_allocate`) against each other and against queries; each protocol
//! is a read-then-write sequence that must not interleave.  Wrapping the
//! engine in an `RwLock`, as [`crate::service::AllocationService`] does,
//! satisfies that contract.
//!
//! # Release cost
//! Release pops waiting requests until one matches the freed bed's category
//! and then re-enqueues the skipped ones.  That is O(n log n) in the worst
//! case (every waiting request needs another category), which is accepted:
//! the heap has no secondary index by category.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::matcher::GreedyMatcher;
use crate::engine::resource_index::ResourceIndex;
use crate::engine::search::{LinearSearch, SearchCriteria};
use crate::engine::waitlist::PriorityWaitlist;
use crate::error::{AllocResult, AllocationError};
use crate::model::{Request, RequestStatus, Resource, ResourceStatus};

/// Reason reported when manual allocation finds no bed.
pub const NO_SUITABLE_RESOURCE: &str = "no suitable resource";

/// Outcome of a protocol call, carrying owned copies of the affected records
/// in their post-decision state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// `admit` found a bed immediately.
    Admitted { request: Request, resource: Resource },
    /// `admit` found nothing; the request is waiting.
    Queued { request: Request },
    /// A freed bed went straight to a waiting request.
    Reassigned { resource: Resource, request: Request },
    /// A freed bed stays free.
    Freed { resource: Resource },
    /// A bed was added OCCUPIED; no matching attempted.
    Added { resource: Resource },
    /// `manual_allocate` placed the request.
    Success { request: Request, resource: Resource },
    /// `manual_allocate` found no bed; the waitlist is unchanged.
    Failure { reason: String },
}

impl Decision {
    /// Short upper-case label, e.g. `"ADMITTED"`.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Admitted { .. } => "ADMITTED",
            Self::Queued { .. } => "QUEUED",
            Self::Reassigned { .. } => "REASSIGNED",
            Self::Freed { .. } => "FREED",
            Self::Added { .. } => "ADDED",
            Self::Success { .. } => "SUCCESS",
            Self::Failure { .. } => "FAILURE",
        }
    }

    /// The bed touched by this decision, if any.
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Self::Admitted { resource, .. }
            | Self::Reassigned { resource, .. }
            | Self::Freed { resource }
            | Self::Added { resource }
            | Self::Success { resource, .. } => Some(resource),
            Self::Queued { .. } | Self::Failure { .. } => None,
        }
    }

    /// The request touched by this decision, if any.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Admitted { request, .. }
            | Self::Queued { request }
            | Self::Reassigned { request, .. }
            | Self::Success { request, .. } => Some(request),
            Self::Freed { .. } | Self::Added { .. } | Self::Failure { .. } => None,
        }
    }
}

/// In-memory allocation state: one bed index, one waitlist.
#[derive(Debug, Default)]
pub struct AllocationEngine {
    index: ResourceIndex,
    waitlist: PriorityWaitlist,
    initialized: bool,
}

impl AllocationEngine {
    /// Create an engine that rejects protocol calls until [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine whose waitlist pre-allocates `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            waitlist: PriorityWaitlist::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Bulk-load persisted state, replacing whatever was held before.
    ///
    /// Only WAITING requests enter the waitlist; others are ignored.
    pub fn initialize<R, Q>(&mut self, resources: R, pending: Q)
    where
        R: IntoIterator<Item = Resource>,
        Q: IntoIterator<Item = Request>,
    {
        self.index = ResourceIndex::new();
        self.waitlist.clear();
        for resource in resources {
            self.index.put(resource);
        }
        let mut skipped = 0usize;
        for request in pending {
            if request.status == RequestStatus::Waiting {
                self.waitlist.enqueue(request);
            } else {
                skipped += 1;
            }
        }
        self.initialized = true;
        info!(
            resources = self.index.len(),
            waiting = self.waitlist.len(),
            skipped,
            "Allocation engine initialized"
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Place a new request on the nearest free bed, or queue it.
    pub fn admit(&mut self, mut request: Request) -> AllocResult<Decision> {
        self.ensure_initialized()?;

        let best_id = GreedyMatcher::find_best(self.index.iter(), &request.required_category)
            .map(|resource| resource.id.clone());

        match best_id {
            Some(resource_id) => {
                let resource = self.occupy(&resource_id)?;
                request.mark_served(&resource_id);
                info!(
                    request_id = %request.id,
                    resource_id = %resource_id,
                    category = %request.required_category,
                    "Request admitted"
                );
                Ok(Decision::Admitted { request, resource })
            }
            None => {
                request.mark_waiting();
                self.waitlist.enqueue(request.clone());
                info!(
                    request_id = %request.id,
                    category = %request.required_category,
                    waiting = self.waitlist.len(),
                    "No free resource, request queued"
                );
                Ok(Decision::Queued { request })
            }
        }
    }

    /// Free a bed and hand it to the best waiting request of its category.
    pub fn release(&mut self, resource_id: &str) -> AllocResult<Decision> {
        self.ensure_initialized()?;
        if !self.index.set_status(resource_id, ResourceStatus::Free) {
            return Err(AllocationError::ResourceNotFound(resource_id.to_string()));
        }
        self.reassign_freed(resource_id)
    }

    /// Register a bed.  A FREE bed is immediately offered to the waitlist
    /// exactly as if it had been released.
    pub fn add_resource(&mut self, resource: Resource) -> AllocResult<Decision> {
        self.ensure_initialized()?;
        let resource_id = resource.id.clone();
        let free = resource.is_free();
        self.index.put(resource.clone());

        if free {
            self.reassign_freed(&resource_id)
        } else {
            info!(resource_id = %resource_id, "Occupied resource added");
            Ok(Decision::Added { resource })
        }
    }

    /// Force-place a specific waiting request, out of priority order.
    pub fn manual_allocate(&mut self, request_id: &str) -> AllocResult<Decision> {
        self.ensure_initialized()?;
        let category = self
            .waitlist
            .find(request_id)
            .map(|request| request.required_category.clone())
            .ok_or_else(|| AllocationError::RequestNotFound(request_id.to_string()))?;

        let Some(resource_id) = GreedyMatcher::find_best(self.index.iter(), &category)
            .map(|resource| resource.id.clone())
        else {
            info!(request_id, category = %category, "Manual allocation found no resource");
            return Ok(Decision::Failure {
                reason: NO_SUITABLE_RESOURCE.to_string(),
            });
        };

        let mut request = self
            .waitlist
            .remove_by_id(request_id)
            .ok_or_else(|| AllocationError::RequestNotFound(request_id.to_string()))?;
        let resource = self.occupy(&resource_id)?;
        request.mark_served(&resource_id);
        info!(
            request_id,
            resource_id = %resource_id,
            "Request manually allocated"
        );
        Ok(Decision::Success { request, resource })
    }

    // ── queries ───────────────────────────────────────────────────────

    /// Snapshot of every bed.
    pub fn list_resources(&self) -> Vec<Resource> {
        self.index.all()
    }

    pub fn get_resource(&self, id: &str) -> Option<Resource> {
        self.index.get(id).cloned()
    }

    /// Beds matching every criterion, see [`LinearSearch`].
    pub fn filter_resources(&self, criteria: &SearchCriteria) -> Vec<Resource> {
        LinearSearch::filter(self.index.iter(), criteria)
    }

    /// Waiting requests in heap-array order (not ranked).
    pub fn list_waiting(&self) -> Vec<Request> {
        self.waitlist.snapshot()
    }

    /// Waiting requests in the order they would be served.
    pub fn list_waiting_ranked(&self) -> Vec<Request> {
        self.waitlist.ranked()
    }

    pub fn waiting_len(&self) -> usize {
        self.waitlist.len()
    }

    pub fn is_waiting(&self, request_id: &str) -> bool {
        self.waitlist.contains(request_id)
    }

    // ── private helpers ───────────────────────────────────────────────

    fn ensure_initialized(&self) -> AllocResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(AllocationError::InvalidState(
                "allocation engine used before initialize",
            ))
        }
    }

    fn occupy(&mut self, resource_id: &str) -> AllocResult<Resource> {
        if !self.index.set_status(resource_id, ResourceStatus::Occupied) {
            return Err(AllocationError::ResourceNotFound(resource_id.to_string()));
        }
        self.index
            .get(resource_id)
            .cloned()
            .ok_or_else(|| AllocationError::ResourceNotFound(resource_id.to_string()))
    }

    /// Steps 2-4 of release against a bed already marked FREE.
    fn reassign_freed(&mut self, resource_id: &str) -> AllocResult<Decision> {
        let category = self
            .index
            .get(resource_id)
            .map(|resource| resource.category.clone())
            .ok_or_else(|| AllocationError::ResourceNotFound(resource_id.to_string()))?;

        let mut skipped = Vec::new();
        let mut matched = None;
        if category.is_recognized() {
            while let Some(candidate) = self.waitlist.dequeue() {
                if candidate.required_category == category {
                    matched = Some(candidate);
                    break;
                }
                skipped.push(candidate);
            }
        }
        if !skipped.is_empty() {
            debug!(count = skipped.len(), "Re-queueing skipped requests");
        }
        for request in skipped {
            self.waitlist.enqueue(request);
        }

        match matched {
            Some(mut request) => {
                let resource = self.occupy(resource_id)?;
                request.mark_served(resource_id);
                info!(
                    resource_id,
                    request_id = %request.id,
                    category = %category,
                    "Freed resource reassigned"
                );
                Ok(Decision::Reassigned { resource, request })
            }
            None => {
                let resource = self
                    .index
                    .get(resource_id)
                    .cloned()
                    .ok_or_else(|| AllocationError::ResourceNotFound(resource_id.to_string()))?;
                info!(resource_id, category = %category, "Resource freed");
                Ok(Decision::Freed { resource })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn patient(id: &str, priority: i32, category: Category, minute: i64) -> Request {
        Request::new(id, id, priority, category, t(minute))
    }

    fn engine_with(resources: Vec<Resource>) -> AllocationEngine {
        let mut engine = AllocationEngine::new();
        engine.initialize(resources, Vec::<Request>::new());
        engine
    }

    // ── Initialization ────────────────────────────────────────────────

    #[test]
    fn test_protocols_require_initialize() {
        let mut engine = AllocationEngine::new();
        let err = engine
            .admit(patient("p", 1, Category::Icu, 0))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidState(_)));
        assert!(matches!(
            engine.release("x").unwrap_err(),
            AllocationError::InvalidState(_)
        ));
        assert!(matches!(
            engine.manual_allocate("p").unwrap_err(),
            AllocationError::InvalidState(_)
        ));
        assert!(matches!(
            engine.add_resource(Resource::new("r", "1", Category::Icu)).unwrap_err(),
            AllocationError::InvalidState(_)
        ));
    }

    #[test]
    fn test_initialize_loads_only_waiting() {
        let mut served = patient("served", 9, Category::Icu, 0);
        served.mark_served("ICU-1");
        let mut engine = AllocationEngine::with_capacity(8);
        engine.initialize(
            vec![Resource::new("ICU-1", "I1", Category::Icu).with_status(ResourceStatus::Occupied)],
            vec![served, patient("waiting", 3, Category::Icu, 1)],
        );
        let waiting = engine.list_waiting();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, "waiting");
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_reinitialize_replaces_state() {
        let mut engine = engine_with(vec![Resource::new("old", "1", Category::Icu)]);
        engine.admit(patient("p", 1, Category::General, 0)).unwrap();
        engine.initialize(
            vec![Resource::new("new", "2", Category::Icu)],
            Vec::<Request>::new(),
        );
        assert_eq!(engine.list_resources().len(), 1);
        assert_eq!(engine.list_resources()[0].id, "new");
        assert_eq!(engine.waiting_len(), 0);
    }

    // ── Admission ─────────────────────────────────────────────────────

    #[test]
    fn test_admit_then_queue() {
        let mut engine = engine_with(vec![Resource::new("ICU-1", "I101", Category::Icu)]);

        let first = engine.admit(patient("P1", 5, Category::Icu, 0)).unwrap();
        match &first {
            Decision::Admitted { request, resource } => {
                assert_eq!(request.status, RequestStatus::Served);
                assert_eq!(request.assigned_resource_id.as_deref(), Some("ICU-1"));
                assert_eq!(resource.status, ResourceStatus::Occupied);
            }
            other => panic!("expected ADMITTED, got {other:?}"),
        }
        assert_eq!(
            engine.get_resource("ICU-1").unwrap().status,
            ResourceStatus::Occupied
        );

        let second = engine.admit(patient("P2", 5, Category::Icu, 1)).unwrap();
        match &second {
            Decision::Queued { request } => {
                assert_eq!(request.status, RequestStatus::Waiting);
                assert!(request.assigned_resource_id.is_none());
            }
            other => panic!("expected QUEUED, got {other:?}"),
        }
        assert_eq!(engine.waiting_len(), 1);
    }

    #[test]
    fn test_admit_clears_stale_assignment_when_queued() {
        let mut engine = engine_with(Vec::new());
        let mut stale = patient("P", 1, Category::Icu, 0);
        stale.assigned_resource_id = Some("ghost".into());
        let decision = engine.admit(stale).unwrap();
        assert!(decision.request().unwrap().assigned_resource_id.is_none());
    }

    // ── Release ───────────────────────────────────────────────────────

    #[test]
    fn test_release_unknown_resource() {
        let mut engine = engine_with(Vec::new());
        assert_eq!(
            engine.release("nope").unwrap_err(),
            AllocationError::ResourceNotFound("nope".into())
        );
    }

    #[test]
    fn test_release_without_match_frees() {
        let mut engine = engine_with(vec![
            Resource::new("ICU-1", "I1", Category::Icu).with_status(ResourceStatus::Occupied),
        ]);
        engine.admit(patient("gen", 4, Category::General, 0)).unwrap();

        let decision = engine.release("ICU-1").unwrap();
        assert_eq!(decision.action(), "FREED");
        assert_eq!(decision.resource().unwrap().status, ResourceStatus::Free);
        assert_eq!(engine.waiting_len(), 1);
    }

    #[test]
    fn test_release_skips_other_categories_preserving_order() {
        let mut engine = engine_with(vec![
            Resource::new("ICU-1", "I1", Category::Icu).with_status(ResourceStatus::Occupied),
        ]);
        engine.admit(patient("gen-9", 9, Category::General, 0)).unwrap();
        engine.admit(patient("icu-5", 5, Category::Icu, 1)).unwrap();
        engine.admit(patient("gen-7", 7, Category::General, 2)).unwrap();

        let decision = engine.release("ICU-1").unwrap();
        match decision {
            Decision::Reassigned { resource, request } => {
                assert_eq!(request.id, "icu-5");
                assert_eq!(resource.status, ResourceStatus::Occupied);
            }
            other => panic!("expected REASSIGNED, got {other:?}"),
        }
        let ranked: Vec<_> = engine
            .list_waiting_ranked()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ranked, ["gen-9", "gen-7"]);
    }

    #[test]
    fn test_release_picks_highest_ranked_match() {
        let mut engine = engine_with(vec![
            Resource::new("ER-1", "E1", Category::Emergency).with_status(ResourceStatus::Occupied),
        ]);
        engine.admit(patient("late", 6, Category::Emergency, 5)).unwrap();
        engine.admit(patient("early", 6, Category::Emergency, 1)).unwrap();
        engine.admit(patient("low", 2, Category::Emergency, 0)).unwrap();

        let decision = engine.release("ER-1").unwrap();
        assert_eq!(decision.request().unwrap().id, "early");
        assert_eq!(engine.waiting_len(), 2);
    }

    // ── AddResource ───────────────────────────────────────────────────

    #[test]
    fn test_add_free_resource_serves_waiting() {
        let mut engine = engine_with(Vec::new());
        engine.admit(patient("P", 3, Category::General, 0)).unwrap();
        let decision = engine
            .add_resource(Resource::new("GEN-1", "G1", Category::General))
            .unwrap();
        assert_eq!(decision.action(), "REASSIGNED");
        assert_eq!(engine.waiting_len(), 0);
        assert_eq!(
            engine.get_resource("GEN-1").unwrap().status,
            ResourceStatus::Occupied
        );
    }

    #[test]
    fn test_add_free_resource_no_waiting() {
        let mut engine = engine_with(Vec::new());
        let decision = engine
            .add_resource(Resource::new("GEN-1", "G1", Category::General))
            .unwrap();
        assert_eq!(decision.action(), "FREED");
    }

    #[test]
    fn test_add_occupied_resource_skips_matching() {
        let mut engine = engine_with(Vec::new());
        engine.admit(patient("P", 3, Category::General, 0)).unwrap();
        let decision = engine
            .add_resource(
                Resource::new("GEN-1", "G1", Category::General)
                    .with_status(ResourceStatus::Occupied),
            )
            .unwrap();
        assert_eq!(decision.action(), "ADDED");
        assert_eq!(engine.waiting_len(), 1);
    }

    // ── ManualAllocate ────────────────────────────────────────────────

    #[test]
    fn test_manual_allocate_not_in_waitlist() {
        let mut engine = engine_with(Vec::new());
        assert_eq!(
            engine.manual_allocate("ghost").unwrap_err(),
            AllocationError::RequestNotFound("ghost".into())
        );
    }

    #[test]
    fn test_manual_allocate_failure_leaves_waitlist() {
        let mut engine = engine_with(Vec::new());
        engine.admit(patient("P", 3, Category::Icu, 0)).unwrap();
        let decision = engine.manual_allocate("P").unwrap();
        assert_eq!(
            decision,
            Decision::Failure {
                reason: NO_SUITABLE_RESOURCE.to_string()
            }
        );
        assert_eq!(engine.waiting_len(), 1);
    }

    #[test]
    fn test_manual_allocate_out_of_order() {
        // The bed arrives occupied so nobody is auto-assigned, then is
        // flipped free administratively behind the waitlist's back.
        let mut engine = engine_with(Vec::new());
        engine.admit(patient("top", 9, Category::Icu, 0)).unwrap();
        engine.admit(patient("low", 1, Category::Icu, 1)).unwrap();
        engine
            .add_resource(Resource::new("ICU-1", "I1", Category::Icu).with_status(ResourceStatus::Occupied))
            .unwrap();
        engine.index.set_status("ICU-1", ResourceStatus::Free);

        let decision = engine.manual_allocate("low").unwrap();
        match decision {
            Decision::Success { request, resource } => {
                assert_eq!(request.id, "low");
                assert_eq!(request.status, RequestStatus::Served);
                assert_eq!(resource.id, "ICU-1");
            }
            other => panic!("expected SUCCESS, got {other:?}"),
        }
        let remaining: Vec<_> = engine.list_waiting().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, ["top"]);
    }

    // ── Queries ───────────────────────────────────────────────────────

    #[test]
    fn test_filter_resources_delegates() {
        let engine = engine_with(vec![
            Resource::new("a", "ICU", Category::Icu),
            Resource::new("b", "GEN", Category::General),
        ]);
        let criteria: SearchCriteria = [("location".to_string(), json!("GEN"))].into();
        let found = engine.filter_resources(&criteria);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");
    }

    #[test]
    fn test_decision_serializes_with_action_tag() {
        let decision = Decision::Freed {
            resource: Resource::new("a", "1", Category::Icu),
        };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["action"], "FREED");
        assert_eq!(value["resource"]["id"], "a");
    }
}
