// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Payload types: what a hydrated node holds and how hydration fails.

use serde_json::{Map, Value};
use thiserror::Error;

/// Dynamic field access over a host-defined payload.
///
/// The engine never interprets fields; it only hands them to renderers and search.
pub trait FieldSource {
    /// Value of the field called `name`, if present.
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl FieldSource for Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<F: FieldSource + ?Sized> FieldSource for &F {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }
}

/// The default hydrated payload: a display label plus dynamic fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HydratedRecord<F = Map<String, Value>> {
    /// Text shown for the node.
    pub label: String,
    /// Everything else the host knows about the node.
    pub fields: F,
}

impl<F> HydratedRecord<F> {
    /// A record with the given label and fields.
    pub fn new(label: impl Into<String>, fields: F) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }
}

impl<F: FieldSource> FieldSource for HydratedRecord<F> {
    fn field(&self, name: &str) -> Option<Value> {
        if name == "label" {
            return Some(Value::String(self.label.clone()));
        }
        self.fields.field(name)
    }
}

/// Why a payload fetch failed.
///
/// Kept per node and surfaced as [`HydrationState::Failed`]; never retried
/// automatically.
///
/// [`HydrationState::Failed`]: crate::HydrationState::Failed
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HydrationFailure {
    /// The data source has no payload for the node.
    #[error("payload not found")]
    NotFound,
    /// The data source reported an error.
    #[error("payload fetch failed: {0}")]
    Fetch(String),
    /// The host gave up waiting.
    #[error("payload fetch timed out after {0} ms")]
    TimedOut(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_fields_fall_through_to_source() {
        let Value::Object(fields) = json!({ "size": 42, "kind": "dir" }) else {
            unreachable!();
        };
        let record = HydratedRecord::new("src", fields);
        assert_eq!(record.field("label"), Some(json!("src")));
        assert_eq!(record.field("size"), Some(json!(42)));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            HydrationFailure::TimedOut(250).to_string(),
            "payload fetch timed out after 250 ms"
        );
        assert_eq!(
            HydrationFailure::Fetch("503".into()).to_string(),
            "payload fetch failed: 503"
        );
    }
}
