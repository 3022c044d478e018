//! Bed and Patient Records
//!
//! Plain value types shared by the engine and its collaborators.  The engine
//! owns its own copies of these records; everything crossing the engine
//! boundary is cloned, never shared mutably.
//!
//! Field names serialize in camelCase so the records match the persisted
//! document shapes (`requiredCategory`, `assignedResourceId`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Ward category shared by beds and patient requirements.
///
/// Unknown tokens are preserved as [`Category::Unrecognized`] rather than
/// rejected; the matcher never pairs an unrecognized requirement with a bed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Intensive care.
    Icu,
    /// General ward.
    General,
    /// Emergency department.
    Emergency,
    /// Any other token, kept verbatim.
    Unrecognized(String),
}

impl Category {
    /// Returns `false` only for [`Category::Unrecognized`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Canonical upper-case token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Icu => "ICU",
            Self::General => "GENERAL",
            Self::Emergency => "EMERGENCY",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s.trim().to_ascii_uppercase().as_str() {
            "ICU" => Self::Icu,
            "GENERAL" | "GEN" => Self::General,
            "EMERGENCY" | "ER" => Self::Emergency,
            _ => Self::Unrecognized(s.to_string()),
        };
        Ok(category)
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(category) => category,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Unrecognized(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

/// Occupancy state of a bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Free,
    Occupied,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => f.pad("FREE"),
            Self::Occupied => f.pad("OCCUPIED"),
        }
    }
}

/// Lifecycle state of a patient request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Held in the waitlist.
    Waiting,
    /// Assigned to a bed.
    #[serde(alias = "ADMITTED")]
    Served,
    /// Bed given back.
    #[serde(alias = "DISCHARGED")]
    Released,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.pad("WAITING"),
            Self::Served => f.pad("SERVED"),
            Self::Released => f.pad("RELEASED"),
        }
    }
}

/// A bed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Unique bed id (e.g. `"ICU-101"`).
    pub id: String,
    /// Free-form location token; its first digit run is the matcher's distance.
    pub location: String,
    pub category: Category,
    pub status: ResourceStatus,
}

impl Resource {
    /// Create a FREE bed.
    pub fn new(
        id: impl Into<String>,
        location: impl Into<String>,
        category: impl Into<Category>,
    ) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            category: category.into(),
            status: ResourceStatus::Free,
        }
    }

    /// Builder-style status override.
    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_free(&self) -> bool {
        self.status == ResourceStatus::Free
    }
}

/// A patient asking for a bed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Unique patient id.
    pub id: String,
    pub name: String,
    /// Higher is more urgent.
    pub priority: i32,
    pub required_category: Category,
    pub arrival: DateTime<Utc>,
    #[serde(default)]
    pub assigned_resource_id: Option<String>,
    pub status: RequestStatus,
}

impl Request {
    /// Create a WAITING request with no bed assigned.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
        required_category: impl Into<Category>,
        arrival: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            required_category: required_category.into(),
            arrival,
            assigned_resource_id: None,
            status: RequestStatus::Waiting,
        }
    }

    /// `true` if `self` must be served before `other`.
    ///
    /// Higher priority wins; equal priorities go to the earlier arrival.
    /// Ids are unique, so no further tie-break is applied.
    pub fn outranks(&self, other: &Request) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.arrival < other.arrival)
    }

    /// Total ordering where `Less` means "served first".
    pub fn rank_cmp(&self, other: &Request) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.arrival.cmp(&other.arrival))
    }

    pub(crate) fn mark_served(&mut self, resource_id: &str) {
        self.status = RequestStatus::Served;
        self.assigned_resource_id = Some(resource_id.to_string());
    }

    pub(crate) fn mark_waiting(&mut self) {
        self.status = RequestStatus::Waiting;
        self.assigned_resource_id = None;
    }
}
