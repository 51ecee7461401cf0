//! Immutable result of the fetch stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::error::AppResult;
use crate::tracker::{fields, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    /// `None` for items without text; the tracker refuses to create those.
    pub fn from_record(record: &Value) -> Option<Self> {
        Some(Self {
            text: fields::checklist_text(record)?,
            checked: fields::checklist_checked(record),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    pub target_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl IssueLink {
    pub fn from_record(record: &Value) -> Option<Self> {
        Some(Self {
            target_key: fields::link_target_key(record)?,
            relationship: fields::link_relationship(record),
            direction: fields::link_direction(record),
        })
    }
}

/// Comment body only; author and timestamps are not carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub text: String,
}

impl IssueComment {
    pub fn from_record(record: &Value) -> Option<Self> {
        fields::comment_text(record).map(|text| Self { text })
    }
}

/// Everything needed to recreate a project elsewhere.
///
/// Sub-resource maps are keyed by the source issue key. Built once by
/// [`fetch_project_snapshot`](super::fetch_project_snapshot) and only read
/// afterwards; it can be saved as JSON and cloned again later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: Record,
    pub issues: Vec<Record>,
    #[serde(default)]
    pub checklists: BTreeMap<String, Vec<ChecklistItem>>,
    #[serde(default)]
    pub links: BTreeMap<String, Vec<IssueLink>>,
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<IssueComment>>,
    /// child key -> parent key
    #[serde(default)]
    pub parent_child: BTreeMap<String, String>,
    /// Per-item fetch failures
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ProjectSnapshot {
    pub fn new(project: Record) -> Self {
        Self {
            project,
            ..Self::default()
        }
    }

    pub fn project_name(&self) -> Option<String> {
        fields::entity_name(&self.project)
    }

    /// Issue keys in snapshot order.
    pub fn issue_keys(&self) -> Vec<String> {
        self.issues.iter().filter_map(fields::issue_key).collect()
    }

    pub fn issue(&self, key: &str) -> Option<&Record> {
        self.issues
            .iter()
            .find(|issue| fields::issue_key(issue).as_deref() == Some(key))
    }

    pub fn contains_issue(&self, key: &str) -> bool {
        self.issue(key).is_some()
    }

    pub fn link_count(&self) -> usize {
        self.links.values().map(Vec::len).sum()
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_ref(), json).await?;
        log::debug!("Snapshot saved to {}", path.as_ref().display());
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> ProjectSnapshot {
        let mut snapshot = ProjectSnapshot::new(json!({"id": "p1", "fields": {"summary": "Apollo"}}));
        snapshot.issues = vec![json!({"key": "A"}), json!({"key": "B", "parent": {"key": "A"}})];
        snapshot.parent_child.insert("B".into(), "A".into());
        snapshot.links.insert(
            "A".into(),
            vec![IssueLink {
                target_key: "B".into(),
                relationship: Some("relates".into()),
                direction: None,
            }],
        );
        snapshot.checklists.insert(
            "B".into(),
            vec![ChecklistItem {
                text: "done".into(),
                checked: false,
            }],
        );
        snapshot
    }

    #[test]
    fn test_lookup_helpers() {
        let snapshot = sample();
        assert_eq!(snapshot.issue_keys(), vec!["A", "B"]);
        assert!(snapshot.contains_issue("B"));
        assert!(!snapshot.contains_issue("C"));
        assert_eq!(snapshot.project_name().as_deref(), Some("Apollo"));
        assert_eq!(snapshot.link_count(), 1);
    }

    #[test]
    fn test_sub_resources_from_records() {
        assert_eq!(
            ChecklistItem::from_record(&json!({"id": "1", "text": "write", "checked": true})),
            Some(ChecklistItem {
                text: "write".into(),
                checked: true
            })
        );
        assert_eq!(ChecklistItem::from_record(&json!({"checked": true})), None);

        let link = IssueLink::from_record(&json!({
            "type": {"id": "depends", "inward": "is dependent by"},
            "direction": "outward",
            "object": {"key": "OPS-2", "display": "x"}
        }))
        .unwrap();
        assert_eq!(link.target_key, "OPS-2");
        assert_eq!(link.relationship.as_deref(), Some("depends"));
        assert_eq!(link.direction.as_deref(), Some("outward"));

        assert_eq!(IssueComment::from_record(&json!({"createdBy": {"id": "1"}})), None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("opscore-snapshot-{}.json", std::process::id()));
        let snapshot = sample();

        snapshot.save(&path).await.unwrap();
        let loaded = ProjectSnapshot::load(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_older_files_without_warnings_still_load() {
        let loaded: ProjectSnapshot = serde_json::from_value(json!({
            "project": {"id": "p"},
            "issues": []
        }))
        .unwrap();
        assert!(loaded.warnings.is_empty());
        assert!(loaded.parent_child.is_empty());
    }
}
