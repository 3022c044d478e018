//! Greedy Bed Matching
//!
//! Picks the single nearest FREE bed of the required category.  "Distance"
//! is the first run of ASCII digits in the bed's location token (`"I101"` →
//! 101, `"G-200"` → 200).  A location with no digits is infinitely far: it
//! is only chosen when no bed with a numeric distance qualifies.
//!
//! The decision is one-shot and local to the request being served; there is
//! no backtracking and no global optimality across concurrent requests.

use crate::model::{Category, Resource};

/// Distance used for locations without digits.
pub const UNREACHABLE: u64 = u64::MAX;

/// Stateless nearest-bed selection.
pub struct GreedyMatcher;

impl GreedyMatcher {
    /// Return the best FREE bed of `required` among `resources`.
    ///
    /// Ties keep the first bed seen: the best is only replaced on a strictly
    /// smaller distance.  Unrecognized categories never match.
    pub fn find_best<'a, I>(resources: I, required: &Category) -> Option<&'a Resource>
    where
        I: IntoIterator<Item = &'a Resource>,
    {
        if !required.is_recognized() {
            return None;
        }

        let mut best: Option<(&Resource, u64)> = None;
        for resource in resources {
            if !resource.is_free() || resource.category != *required {
                continue;
            }
            let distance = Self::distance(&resource.location);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((resource, distance)),
            }
        }
        best.map(|(resource, _)| resource)
    }

    /// Parse the first contiguous digit run of `location`.
    ///
    /// Runs too long for `u64` saturate just below [`UNREACHABLE`], so any
    /// numeric location still beats one without digits.
    pub fn distance(location: &str) -> u64 {
        let digits: &str = {
            let start = match location.find(|c: char| c.is_ascii_digit()) {
                Some(start) => start,
                None => return UNREACHABLE,
            };
            let rest = &location[start..];
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            &rest[..end]
        };
        digits.parse().unwrap_or(UNREACHABLE - 1)
    }
}
