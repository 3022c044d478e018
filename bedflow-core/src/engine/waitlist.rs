//! Priority Waitlist - Binary Heap of Waiting Patients
//!
//! A max-heap over [`Request`]s ordered by [`Request::outranks`]: higher
//! priority first, earlier arrival first among equals.
//!
//! `std::collections::BinaryHeap` is not used because the manual-allocation
//! path has to pull an arbitrary, non-root entry out of the structure, and
//! callers need the raw array order for snapshots.
//!
//! # Complexity
//! - `enqueue` / `dequeue`: O(log n)
//! - `peek`: O(1)
//! - `remove_by_id` / `find`: O(n) scan, then O(log n) repair

use tracing::debug;

use crate::model::Request;

/// Heap-ordered collection of WAITING requests.
#[derive(Debug, Default, Clone)]
pub struct PriorityWaitlist {
    heap: Vec<Request>,
}

impl PriorityWaitlist {
    /// Create an empty waitlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty waitlist with room for `capacity` requests.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
        }
    }

    /// Append and sift up.
    pub fn enqueue(&mut self, request: Request) {
        debug!(request_id = %request.id, priority = request.priority, "Enqueue");
        self.heap.push(request);
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove and return the highest-ranked request.
    pub fn dequeue(&mut self) -> Option<Request> {
        if self.heap.is_empty() {
            return None;
        }
        let root = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(root)
    }

    /// Highest-ranked request without removing it.
    pub fn peek(&self) -> Option<&Request> {
        self.heap.first()
    }

    /// Remove the request with `id` from anywhere in the heap.
    ///
    /// The last element fills the hole and is sifted in whichever direction
    /// restores heap order.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Request> {
        let pos = self.position(id)?;
        let removed = self.heap.swap_remove(pos);
        if pos < self.heap.len() {
            let settled = self.sift_up(pos);
            if settled == pos {
                self.sift_down(pos);
            }
        }
        debug!(request_id = id, remaining = self.heap.len(), "Removed from waitlist");
        Some(removed)
    }

    /// Linear lookup by id.
    pub fn find(&self, id: &str) -> Option<&Request> {
        self.heap.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Copy of the underlying array in heap order, NOT rank order.
    pub fn snapshot(&self) -> Vec<Request> {
        self.heap.clone()
    }

    /// Copy of the waitlist sorted by rank.  Leaves the heap untouched.
    pub fn ranked(&self) -> Vec<Request> {
        let mut ranked = self.heap.clone();
        ranked.sort_by(Request::rank_cmp);
        ranked
    }

    /// Empty the waitlist, yielding requests in rank order.
    pub fn drain_ranked(&mut self) -> Vec<Request> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(request) = self.dequeue() {
            out.push(request);
        }
        out
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.heap.iter().position(|r| r.id == id)
    }

    /// Returns the final index of the element that started at `idx`.
    fn sift_up(&mut self, mut idx: usize) -> usize {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.heap[idx].outranks(&self.heap[parent]) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
        idx
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut best = left;
            if right < len && self.heap[right].outranks(&self.heap[left]) {
                best = right;
            }
            if !self.heap[best].outranks(&self.heap[idx]) {
                break;
            }
            self.heap.swap(idx, best);
            idx = best;
        }
    }

    #[cfg(test)]
    fn is_heap(&self) -> bool {
        (1..self.heap.len()).all(|i| !self.heap[i].outranks(&self.heap[(i - 1) / 2]))
    }
}

impl FromIterator<Request> for PriorityWaitlist {
    fn from_iter<I: IntoIterator<Item = Request>>(iter: I) -> Self {
        let mut waitlist = Self::new();
        for request in iter {
            waitlist.enqueue(request);
        }
        waitlist
    }
}
