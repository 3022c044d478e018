//! Bed Storage - Keyed Resource Index
//!
//! O(1) expected-time insert, lookup, status update and removal of beds by id.
//!
//! Beds live in a dense slot vector addressed through a `HashMap` of
//! positions.  Iteration follows insertion order, which keeps the greedy
//! matcher's first-seen tie-break deterministic across runs.  Removal leaves
//! a tombstone; tombstones are compacted once they outnumber live entries.
//!
//! No validation of categories or statuses happens here.

use std::collections::HashMap;
use tracing::debug;

use crate::model::{Resource, ResourceStatus};

/// Hash-indexed store of every known bed.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    positions: HashMap<String, usize>,
    slots: Vec<Option<Resource>>,
    tombstones: usize,
}

impl ResourceIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bed, or overwrite the one with the same id in place.
    pub fn put(&mut self, resource: Resource) {
        match self.positions.get(&resource.id) {
            Some(&pos) => {
                debug!(resource_id = %resource.id, "Overwriting indexed resource");
                self.slots[pos] = Some(resource);
            }
            None => {
                debug!(resource_id = %resource.id, "Indexing new resource");
                self.positions.insert(resource.id.clone(), self.slots.len());
                self.slots.push(Some(resource));
            }
        }
    }

    /// Look up a bed by id.
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.positions
            .get(id)
            .and_then(|&pos| self.slots[pos].as_ref())
    }

    /// Update a bed's status.  Returns `false` if the id is unknown.
    pub fn set_status(&mut self, id: &str, status: ResourceStatus) -> bool {
        let Some(&pos) = self.positions.get(id) else {
            return false;
        };
        match self.slots[pos].as_mut() {
            Some(resource) => {
                debug!(resource_id = id, %status, "Resource status updated");
                resource.status = status;
                true
            }
            None => false,
        }
    }

    /// Remove a bed.  Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        self.slots[pos] = None;
        self.tombstones += 1;
        debug!(resource_id = id, "Resource removed from index");
        if self.tombstones > self.positions.len() {
            self.compact();
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Borrowing iterator in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.slots.iter().flatten()
    }

    /// Owned snapshot of every bed in insertion order.
    ///
    /// The snapshot does not follow later mutations of the index.
    pub fn all(&self) -> Vec<Resource> {
        self.iter().cloned().collect()
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.positions.clear();
        for (pos, resource) in self.slots.iter().flatten().enumerate() {
            self.positions.insert(resource.id.clone(), pos);
        }
        self.tombstones = 0;
        debug!(live = self.slots.len(), "Resource index compacted");
    }
}
