//! Request bodies for entity and issue creation.
//!
//! Drafts are built from a source record through the accessors in
//! [`fields`](super::fields), so every reference is already reduced to its
//! canonical id/key, and serialized only with the fields that carry a value.

use serde_json::{json, Map, Value};

use super::fields::{self, ParentRef};

/// Fields of a project to create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDraft {
    pub summary: String,
    pub description: Option<String>,
    pub lead: Option<String>,
    pub team_access: Option<bool>,
    pub team_users: Vec<String>,
    pub parent_entity: Option<ParentRef>,
}

impl ProjectDraft {
    /// Copies the settings of `source` under a new name.
    pub fn from_source(source: &Value, summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            description: fields::extract_description(source),
            lead: fields::extract_lead_id(source),
            team_access: fields::extract_team_access(source),
            team_users: fields::extract_team_user_ids(source),
            parent_entity: fields::extract_parent_portfolio(source),
        }
    }

    /// The `fields` object of an entity creation request.
    pub fn to_fields(&self) -> Value {
        let mut body = Map::new();
        body.insert("summary".into(), json!(self.summary));
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(lead) = &self.lead {
            body.insert("lead".into(), json!(lead));
        }
        if let Some(team_access) = self.team_access {
            body.insert("teamAccess".into(), json!(team_access));
        }
        if !self.team_users.is_empty() {
            body.insert("teamUsers".into(), json!(self.team_users));
        }
        if let Some(parent) = &self.parent_entity {
            body.insert("parentEntity".into(), parent.to_value());
        }
        Value::Object(body)
    }
}

/// Fields of an issue to create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDraft {
    pub queue: String,
    pub summary: String,
    pub description: Option<String>,
    /// Short id of the project the issue belongs to
    pub project: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    pub deadline: Option<String>,
    pub estimation: Option<String>,
}

impl IssueDraft {
    /// Copies `source` into `queue`, attached to `project`.
    ///
    /// A source without a summary gets its key as summary; the tracker
    /// refuses issues without one.
    pub fn from_source(source: &Value, queue: &str, project: Option<&str>) -> Self {
        let summary = fields::issue_summary(source)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| fields::issue_key(source))
            .unwrap_or_default();

        Self {
            queue: queue.to_string(),
            summary,
            description: fields::issue_description(source),
            project: project.map(str::to_string),
            issue_type: fields::issue_type_key(source),
            priority: fields::issue_priority_key(source),
            assignee: fields::issue_assignee(source),
            tags: fields::issue_tags(source),
            deadline: fields::issue_deadline(source),
            estimation: fields::issue_estimation(source),
        }
    }

    /// Body of an issue creation request.
    pub fn to_fields(&self) -> Value {
        let mut body = Map::new();
        body.insert("queue".into(), json!(self.queue));
        body.insert("summary".into(), json!(self.summary));

        let optional = [
            ("description", &self.description),
            ("type", &self.issue_type),
            ("priority", &self.priority),
            ("assignee", &self.assignee),
            ("deadline", &self.deadline),
            ("estimation", &self.estimation),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                body.insert(name.into(), json!(value));
            }
        }

        if let Some(project) = &self.project {
            body.insert("project".into(), json!({ "primary": numeric_or_string(project) }));
        }
        if !self.tags.is_empty() {
            body.insert("tags".into(), json!(self.tags));
        }
        Value::Object(body)
    }
}

/// Short ids are integers on the wire; keep anything else verbatim.
fn numeric_or_string(id: &str) -> Value {
    id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_project_draft_from_nested_source() {
        let source = json!({
            "id": "old",
            "fields": {
                "summary": "Apollo",
                "description": "  moon  ",
                "lead": {"id": "1130000", "display": "Ann"},
                "teamAccess": true,
                "teamUsers": [{"id": "1"}, {"id": "2"}],
                "parentEntity": "pf-9"
            }
        });

        let draft = ProjectDraft::from_source(&source, "Apollo 2");
        assert_eq!(
            draft.to_fields(),
            json!({
                "summary": "Apollo 2",
                "description": "  moon  ",
                "lead": "1130000",
                "teamAccess": true,
                "teamUsers": ["1", "2"],
                "parentEntity": {"primary": "pf-9", "secondary": []}
            })
        );
    }

    #[test]
    fn test_project_draft_skips_absent_fields() {
        let draft = ProjectDraft::from_source(&json!({"description": " ", "lead": null}), "Empty");
        assert_eq!(draft.to_fields(), json!({"summary": "Empty"}));
    }

    #[test]
    fn test_issue_draft_reduces_references() {
        let source = json!({
            "key": "OPS-1",
            "summary": "Build",
            "description": "desc",
            "type": {"key": "task", "display": "Task"},
            "priority": {"key": "critical"},
            "assignee": {"id": "77", "display": "Ann"},
            "tags": ["x"],
            "deadline": "2026-01-31",
            "estimation": "P1D",
            "status": {"key": "open"}
        });

        let draft = IssueDraft::from_source(&source, "NEW", Some("12"));
        assert_eq!(
            draft.to_fields(),
            json!({
                "queue": "NEW",
                "summary": "Build",
                "description": "desc",
                "type": "task",
                "priority": "critical",
                "assignee": "77",
                "deadline": "2026-01-31",
                "estimation": "P1D",
                "project": {"primary": 12},
                "tags": ["x"]
            })
        );
    }

    #[test]
    fn test_issue_draft_summary_falls_back_to_key() {
        let draft = IssueDraft::from_source(&json!({"key": "OPS-5", "summary": ""}), "Q", None);
        assert_eq!(draft.summary, "OPS-5");
        assert_eq!(draft.to_fields(), json!({"queue": "Q", "summary": "OPS-5"}));
    }

    #[test]
    fn test_project_reference_keeps_non_numeric_ids() {
        let draft = IssueDraft::from_source(&json!({"summary": "s"}), "Q", Some("abc"));
        assert_eq!(draft.to_fields()["project"], json!({"primary": "abc"}));
    }
}
