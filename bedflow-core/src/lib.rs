//! Bedflow Core - Priority-Driven Hospital Bed Allocation
//!
//! An in-memory allocation engine that assigns patient requests to beds.
//! Requests are ranked by clinical priority (then arrival time); beds are
//! matched by category and proximity.  The engine is fully synchronous and
//! performs no I/O; [`service::AllocationService`] wraps it with locking and
//! a pluggable [`store::Store`].
//!
//! # Performance-First Design:
//! - Hand-rolled binary heap with O(log n) removal by id
//! - Hash-indexed bed lookup with stable iteration order
//! - Engine lock never held across store I/O

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod seed;
pub mod service;
pub mod store;

pub use config::EngineConfig;
pub use engine::{
    AllocationEngine, Decision, GreedyMatcher, LinearSearch, PriorityWaitlist, ResourceIndex,
    SearchCriteria,
};
pub use error::{AllocResult, AllocationError};
pub use metrics::{AllocationMetrics, MetricsSnapshot};
pub use model::{Category, Request, RequestStatus, Resource, ResourceStatus};
pub use seed::{SeedEvent, SeedFile};
pub use service::{AllocationService, NewRequest};
pub use store::{MemoryStore, Store};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.log_filter`.  Returns `false` if a subscriber
/// was already installed, in which case nothing changes.
pub fn init_tracing(config: &EngineConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.log_json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_idempotent() {
        let config = EngineConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
