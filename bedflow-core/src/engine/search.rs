//! Linear Search over Beds
//!
//! Read-side filtering for ad-hoc queries (`status=FREE`, `location=ICU`,
//! ...).  Never used on the allocation path.
//!
//! Criteria name serialized fields (`id`, `location`, `category`,
//! `status`).  Equality is loose: numbers and strings compare by their
//! textual form, so `{"id": 101}` matches a bed whose id is `"101"`.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::model::Resource;

/// Field name → expected value.
pub type SearchCriteria = HashMap<String, Value>;

/// Stateless predicate scan.
pub struct LinearSearch;

impl LinearSearch {
    /// Every bed whose fields equal all `criteria`, in input order.
    ///
    /// Empty criteria match everything.  A criterion naming an unknown
    /// field matches nothing.
    pub fn filter<'a, I>(resources: I, criteria: &SearchCriteria) -> Vec<Resource>
    where
        I: IntoIterator<Item = &'a Resource>,
    {
        resources
            .into_iter()
            .filter(|resource| Self::matches(resource, criteria))
            .cloned()
            .collect()
    }

    /// Does a single bed satisfy every criterion?
    pub fn matches(resource: &Resource, criteria: &SearchCriteria) -> bool {
        if criteria.is_empty() {
            return true;
        }
        let fields = match serde_json::to_value(resource) {
            Ok(Value::Object(fields)) => fields,
            _ => return false,
        };
        criteria
            .iter()
            .all(|(key, expected)| Self::field_matches(&fields, key, expected))
    }

    fn field_matches(fields: &Map<String, Value>, key: &str, expected: &Value) -> bool {
        match fields.get(key) {
            Some(actual) => loose_eq(actual, expected),
            None => false,
        }
    }
}

fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::Number(e)) | (Value::Number(e), Value::String(a)) => {
            a.trim() == e.to_string()
        }
        (Value::String(a), Value::Bool(e)) | (Value::Bool(e), Value::String(a)) => {
            a.as_str() == if *e { "true" } else { "false" }
        }
        _ => actual == expected,
    }
}
