//! Field accessors for tracker records.
//!
//! Tracker records are loosely shaped: depending on the entity and API
//! version a field sits at the top level or under a `fields` wrapper, and a
//! reference is either a bare id/key or an object carrying one. Every
//! accessor here tries the known shapes in a fixed order and returns `None`
//! (or an empty list) instead of failing. JSON `null` counts as absent.

use serde_json::Value;

/// Top-level value first, then the one nested under `fields`.
pub fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    record
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| record.get("fields").and_then(|f| f.get(name)).filter(|v| !v.is_null()))
}

/// A string field, as-is.
pub fn string_field(record: &Value, name: &str) -> Option<String> {
    field(record, name).and_then(Value::as_str).map(str::to_string)
}

/// Renders a scalar id (string or number) as a string.
pub fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Canonical identifier of a reference: a scalar, or `key`, `id`, `login`
/// of an object, in that order.
pub fn reference_key(value: &Value) -> Option<String> {
    scalar_id(value).or_else(|| {
        ["key", "id", "login"]
            .iter()
            .find_map(|name| value.get(*name).and_then(scalar_id))
    })
}

/// Like [`reference_key`] but prefers `id` over `key`; used for users.
pub fn reference_id(value: &Value) -> Option<String> {
    scalar_id(value).or_else(|| {
        ["id", "uid", "login"]
            .iter()
            .find_map(|name| value.get(*name).and_then(scalar_id))
    })
}

/// Identifiers of every element of an array field.
fn id_list(record: &Value, name: &str, pick: fn(&Value) -> Option<String>) -> Vec<String> {
    field(record, name)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(pick).collect())
        .unwrap_or_default()
}

// ---- entities (projects, portfolios) ----

/// Entity id (`id`, string or number)
pub fn entity_id(record: &Value) -> Option<String> {
    record.get("id").and_then(scalar_id)
}

/// Entity short id (`shortId`), used to attach issues to a project
pub fn short_id(record: &Value) -> Option<String> {
    field(record, "shortId").and_then(scalar_id)
}

/// Human name of an entity: `summary`, falling back to `name`
pub fn entity_name(record: &Value) -> Option<String> {
    string_field(record, "summary").or_else(|| string_field(record, "name"))
}

/// Description, only when it has non-whitespace content
pub fn extract_description(record: &Value) -> Option<String> {
    string_field(record, "description").filter(|d| !d.trim().is_empty())
}

/// Lead user id. The lead object carries an id and a display name but no
/// login, so only the id is taken.
pub fn extract_lead_id(record: &Value) -> Option<String> {
    let lead = field(record, "lead")?;
    scalar_id(lead).or_else(|| lead.get("id").and_then(scalar_id))
}

/// Access policy flag (`teamAccess`); accepts booleans and "true"/"false"
pub fn extract_team_access(record: &Value) -> Option<bool> {
    match field(record, "teamAccess")? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Team member ids (`teamUsers`)
pub fn extract_team_user_ids(record: &Value) -> Vec<String> {
    id_list(record, "teamUsers", reference_id)
}

/// Parent portfolio in `{primary, secondary}` form.
///
/// Accepted source shapes, in priority order:
/// - `{"primary": <ref>, "secondary": [<ref>...]}`
/// - `{"id": ...}` / `{"key": ...}`
/// - a bare id
pub fn extract_parent_portfolio(record: &Value) -> Option<ParentRef> {
    let parent = field(record, "parentEntity")?;

    if let Some(primary) = parent.get("primary").filter(|v| !v.is_null()) {
        let primary = reference_id(primary)?;
        let secondary = parent
            .get("secondary")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(reference_id).collect())
            .unwrap_or_default();
        return Some(ParentRef { primary, secondary });
    }

    reference_id(parent).map(|primary| ParentRef {
        primary,
        secondary: Vec::new(),
    })
}

/// Structural parent reference of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub primary: String,
    pub secondary: Vec<String>,
}

impl ParentRef {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "primary": self.primary,
            "secondary": self.secondary,
        })
    }
}

// ---- issues ----

/// Issue key (`key`)
pub fn issue_key(record: &Value) -> Option<String> {
    field(record, "key").and_then(scalar_id)
}

/// Key of the declared parent issue (`parent`)
pub fn issue_parent_key(record: &Value) -> Option<String> {
    field(record, "parent").and_then(reference_key)
}

pub fn issue_summary(record: &Value) -> Option<String> {
    string_field(record, "summary")
}

pub fn issue_description(record: &Value) -> Option<String> {
    string_field(record, "description")
}

/// Issue type key (`type.key`)
pub fn issue_type_key(record: &Value) -> Option<String> {
    field(record, "type").and_then(reference_key)
}

/// Priority key (`priority.key`)
pub fn issue_priority_key(record: &Value) -> Option<String> {
    field(record, "priority").and_then(reference_key)
}

/// Assignee id, or login when the id is missing
pub fn issue_assignee(record: &Value) -> Option<String> {
    field(record, "assignee").and_then(reference_id)
}

/// Follower ids (or logins)
pub fn issue_follower_ids(record: &Value) -> Vec<String> {
    id_list(record, "followers", reference_id)
}

pub fn issue_tags(record: &Value) -> Vec<String> {
    field(record, "tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn issue_deadline(record: &Value) -> Option<String> {
    string_field(record, "deadline")
}

/// Estimation as an ISO-8601 duration string (e.g. `P2D`)
pub fn issue_estimation(record: &Value) -> Option<String> {
    field(record, "estimation").and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ---- sub-resources ----

/// Checklist item text and checked flag
pub fn checklist_text(record: &Value) -> Option<String> {
    string_field(record, "text")
}

pub fn checklist_checked(record: &Value) -> bool {
    field(record, "checked").and_then(Value::as_bool).unwrap_or(false)
}

/// Key of the issue at the other end of a link (`object.key`, then `issue.key`)
pub fn link_target_key(record: &Value) -> Option<String> {
    ["object", "issue"]
        .iter()
        .find_map(|name| field(record, name).and_then(reference_key))
}

/// Relationship id of a link (`type.id`, or a bare `type` / `relationship` string)
pub fn link_relationship(record: &Value) -> Option<String> {
    field(record, "type")
        .and_then(|t| scalar_id(t).or_else(|| t.get("id").and_then(scalar_id)))
        .or_else(|| string_field(record, "relationship"))
}

/// `inward` / `outward`
pub fn link_direction(record: &Value) -> Option<String> {
    string_field(record, "direction")
}

pub fn comment_text(record: &Value) -> Option<String> {
    string_field(record, "text")
}
