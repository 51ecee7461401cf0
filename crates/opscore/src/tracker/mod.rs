//! Remote tracker gateway.
//!
//! Provides the `TrackerGateway` trait, the capability set the cloning
//! engine consumes, and `HttpTracker`, its REST implementation. Records are
//! kept as opaque JSON; [`fields`] turns them into typed values and
//! [`draft`] builds request bodies from them.

pub mod draft;
pub mod error;
pub mod fields;
pub mod http;

use async_trait::async_trait;
use serde_json::Value;

pub use draft::{IssueDraft, ProjectDraft};
pub use error::{TrackerError, TrackerResult};
pub use http::HttpTracker;

/// An opaque tracker record (issue, project, link, ...).
pub type Record = Value;

/// Kinds of entities living under `/entities/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Portfolio,
    Goal,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Portfolio => "portfolio",
            EntityKind::Goal => "goal",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields requested when reading a project for cloning.
pub const PROJECT_FIELDS: &[&str] = &[
    "summary",
    "description",
    "lead",
    "teamAccess",
    "teamUsers",
    "parentEntity",
    "entityStatus",
];

/// Capabilities of the remote tracker.
///
/// Every call is network-bound and individually fallible. Implementations
/// handle pagination, pacing and retries themselves; callers see one
/// complete answer or one error per call.
#[async_trait]
pub trait TrackerGateway: Send + Sync {
    /// Reads one entity with the requested fields.
    async fn get_entity(&self, kind: EntityKind, id: &str, fields: &[&str]) -> TrackerResult<Record>;

    /// Lists entities of a kind, optionally filtered. All pages are returned.
    async fn search_entities(
        &self,
        kind: EntityKind,
        filter: Option<&Value>,
        fields: &[&str],
    ) -> TrackerResult<Vec<Record>>;

    /// Creates an entity from its `fields` object. The answer carries at least
    /// an `id` and, for projects, a `shortId`.
    async fn create_entity(&self, kind: EntityKind, fields: &Value) -> TrackerResult<Record>;

    async fn get_issue(&self, key: &str) -> TrackerResult<Record>;

    /// Issues matching a filter. All pages are returned.
    async fn search_issues(&self, filter: &Value) -> TrackerResult<Vec<Record>>;

    /// Creates an issue. The answer carries at least a `key`.
    async fn create_issue(&self, fields: &Value) -> TrackerResult<Record>;

    async fn update_issue(&self, key: &str, fields: &Value) -> TrackerResult<Record>;

    async fn get_checklist(&self, key: &str) -> TrackerResult<Vec<Record>>;

    async fn create_checklist_item(&self, key: &str, text: &str, checked: bool) -> TrackerResult<()>;

    async fn get_links(&self, key: &str) -> TrackerResult<Vec<Record>>;

    /// Links `key` to `target` with the given relationship id (e.g. "relates").
    async fn create_link(&self, key: &str, relationship: &str, target: &str) -> TrackerResult<()>;

    async fn get_comments(&self, key: &str) -> TrackerResult<Vec<Record>>;

    async fn create_comment(&self, key: &str, text: &str) -> TrackerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_path_names() {
        assert_eq!(EntityKind::Project.as_str(), "project");
        assert_eq!(EntityKind::Portfolio.to_string(), "portfolio");
        assert_eq!(EntityKind::Goal.as_str(), "goal");
    }

    #[test]
    fn test_project_fields_cover_copied_settings() {
        for name in ["description", "lead", "teamAccess", "teamUsers", "parentEntity"] {
            assert!(PROJECT_FIELDS.contains(&name), "{name} missing");
        }
    }
}
