//! Engine module - Core allocation components
//!
//! Leaves first: the bed index, the priority waitlist, the two stateless
//! scans (greedy matcher and linear search), and the engine that ties them
//! into the admission, release and manual-override protocols.

pub mod allocator;
pub mod matcher;
pub mod resource_index;
pub mod search;
pub mod waitlist;

pub use allocator::{AllocationEngine, Decision, NO_SUITABLE_RESOURCE};
pub use matcher::GreedyMatcher;
pub use resource_index::ResourceIndex;
pub use search::{LinearSearch, SearchCriteria};
pub use waitlist::PriorityWaitlist;
