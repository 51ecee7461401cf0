//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

pub mod tracker;

use async_trait::async_trait;
use opscore::cloning::ProgressSink;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[allow(unused_imports)]
pub use tracker::{Call, FakeTracker};

/// Progress sink keeping every value.
#[derive(Clone, Default)]
pub struct ProgressLog(Arc<Mutex<Vec<f64>>>);

impl ProgressLog {
    pub fn values(&self) -> Vec<f64> {
        self.0.lock().unwrap().clone()
    }

    /// Non-decreasing and ending at exactly 100.
    pub fn assert_complete(&self) {
        let values = self.values();
        assert!(!values.is_empty(), "no progress reported");
        for pair in values.windows(2) {
            assert!(pair[0] <= pair[1], "progress went back: {:?}", values);
        }
        assert_eq!(values.last().copied(), Some(100.0), "progress: {:?}", values);
    }
}

#[async_trait]
impl ProgressSink for ProgressLog {
    async fn report(&self, value: f64) {
        self.0.lock().unwrap().push(value);
    }
}

pub fn project_record() -> Value {
    json!({
        "id": "P",
        "shortId": 7,
        "fields": {
            "summary": "Apollo",
            "description": "Moon program",
            "lead": {"id": "1130000", "display": "Ann"},
            "teamAccess": true,
            "teamUsers": [{"id": "11"}, {"id": "12"}],
            "parentEntity": {"primary": {"id": "pf-1"}, "secondary": []}
        }
    })
}

pub fn issue(key: &str) -> Value {
    json!({ "key": key, "summary": key })
}

pub fn child_issue(key: &str, parent: &str) -> Value {
    json!({ "key": key, "summary": key, "parent": {"key": parent, "display": parent} })
}

/// Link as the tracker returns it from the outward end: owner -> `target`.
pub fn link_to(target: &str, type_id: &str) -> Value {
    link_record(target, type_id, "outward")
}

/// The same link read from the other end: `source` -> owner.
pub fn link_from(source: &str, type_id: &str) -> Value {
    link_record(source, type_id, "inward")
}

fn link_record(other: &str, type_id: &str, direction: &str) -> Value {
    json!({
        "type": {"id": type_id},
        "direction": direction,
        "object": {"key": other, "display": other}
    })
}

/// Project P: A is the parent of B, A relates to B, B has one open checklist
/// item and one comment.
pub fn scenario_tracker() -> FakeTracker {
    FakeTracker::new(project_record())
        .with_issues(vec![issue("A"), child_issue("B", "A")])
        .with_links("A", vec![link_to("B", "relates")])
        .with_checklist("B", vec![json!({"id": "c1", "text": "done", "checked": false})])
        .with_comments("B", vec![json!({"id": 1, "text": "hi", "createdBy": {"id": "5"}})])
}
