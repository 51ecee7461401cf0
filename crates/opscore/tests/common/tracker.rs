//! In-memory tracker that records every call it gets.
//!
//! Reads are served from fixtures, writes are recorded as [`Call`]s and
//! answered with deterministic keys (`<summary>2`). Any operation can be made
//! to fail for a given key with [`FakeTracker::fail_on`].

#![allow(dead_code)]

use async_trait::async_trait;
use opscore::tracker::{EntityKind, Record, TrackerError, TrackerGateway, TrackerResult};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A mutating call made against the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateEntity(Value),
    CreateIssue(Value),
    UpdateIssue { key: String, fields: Value },
    CreateChecklistItem { key: String, text: String, checked: bool },
    CreateLink { key: String, relationship: String, target: String },
    CreateComment { key: String, text: String },
}

impl Call {
    /// Issue key the call acts on, if any.
    pub fn issue_key(&self) -> Option<&str> {
        match self {
            Call::UpdateIssue { key, .. }
            | Call::CreateChecklistItem { key, .. }
            | Call::CreateLink { key, .. }
            | Call::CreateComment { key, .. } => Some(key),
            Call::CreateEntity(_) | Call::CreateIssue(_) => None,
        }
    }
}

#[derive(Default)]
struct State {
    project: Value,
    issues: Vec<Value>,
    reachable: HashMap<String, Value>,
    subtasks: HashMap<String, Vec<Value>>,
    checklists: HashMap<String, Vec<Value>>,
    links: HashMap<String, Vec<Value>>,
    comments: HashMap<String, Vec<Value>>,
    failures: HashSet<(String, String)>,
    calls: Vec<Call>,
    reads: Vec<(String, String)>,
    projects_created: u32,
}

pub struct FakeTracker {
    state: Mutex<State>,
}

impl FakeTracker {
    pub fn new(project: Value) -> Self {
        Self {
            state: Mutex::new(State {
                project,
                ..State::default()
            }),
        }
    }

    /// Issues returned by the project search, in order, duplicates included.
    pub fn with_issues(self, issues: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for issue in &issues {
                if let Some(key) = issue["key"].as_str() {
                    state.reachable.insert(key.to_string(), issue.clone());
                }
            }
            state.issues = issues;
        }
        self
    }

    /// An issue outside the project search, readable one by one.
    pub fn with_reachable(self, issue: Value) -> Self {
        if let Some(key) = issue["key"].as_str() {
            self.state.lock().unwrap().reachable.insert(key.to_string(), issue.clone());
        }
        self
    }

    /// Children returned by a search on `parent`.
    pub fn with_subtasks(self, parent: &str, children: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for child in &children {
                if let Some(key) = child["key"].as_str() {
                    state.reachable.insert(key.to_string(), child.clone());
                }
            }
            state.subtasks.insert(parent.to_string(), children);
        }
        self
    }

    pub fn with_checklist(self, key: &str, items: Vec<Value>) -> Self {
        self.state.lock().unwrap().checklists.insert(key.to_string(), items);
        self
    }

    pub fn with_links(self, key: &str, links: Vec<Value>) -> Self {
        self.state.lock().unwrap().links.insert(key.to_string(), links);
        self
    }

    pub fn with_comments(self, key: &str, comments: Vec<Value>) -> Self {
        self.state.lock().unwrap().comments.insert(key.to_string(), comments);
        self
    }

    /// Makes `operation` fail for `key`.
    ///
    /// The key is the issue key for reads and issue-scoped writes, the
    /// summary for `create_issue`, and `"project"` for `create_entity`.
    pub fn fail_on(self, operation: &str, key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((operation.to_string(), key.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// `(operation, key)` of every read.
    pub fn reads(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn check(&self, operation: &str, key: &str) -> TrackerResult<()> {
        let state = self.state.lock().unwrap();
        if state.failures.contains(&(operation.to_string(), key.to_string())) {
            return Err(TrackerError::Rejected(format!("{operation} refused for {key}")));
        }
        Ok(())
    }

    fn read(&self, operation: &str, key: &str) -> TrackerResult<()> {
        self.state
            .lock()
            .unwrap()
            .reads
            .push((operation.to_string(), key.to_string()));
        self.check(operation, key)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn list(&self, operation: &str, key: &str, pick: fn(&State) -> &HashMap<String, Vec<Value>>) -> TrackerResult<Vec<Record>> {
        self.read(operation, key)?;
        let state = self.state.lock().unwrap();
        Ok(pick(&state).get(key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TrackerGateway for FakeTracker {
    async fn get_entity(&self, _kind: EntityKind, id: &str, _fields: &[&str]) -> TrackerResult<Record> {
        self.read("get_entity", id)?;
        Ok(self.state.lock().unwrap().project.clone())
    }

    async fn search_entities(
        &self,
        _kind: EntityKind,
        _filter: Option<&Value>,
        _fields: &[&str],
    ) -> TrackerResult<Vec<Record>> {
        Ok(vec![self.state.lock().unwrap().project.clone()])
    }

    async fn create_entity(&self, _kind: EntityKind, fields: &Value) -> TrackerResult<Record> {
        self.record(Call::CreateEntity(fields.clone()));
        self.check("create_entity", "project")?;

        let mut state = self.state.lock().unwrap();
        state.projects_created += 1;
        let n = state.projects_created;
        Ok(json!({ "id": format!("new-project-{n}"), "shortId": 100 + n }))
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<Record> {
        self.read("get_issue", key)?;
        self.state
            .lock()
            .unwrap()
            .reachable
            .get(key)
            .cloned()
            .ok_or_else(|| TrackerError::Status {
                operation: "get_issue",
                status: reqwest::StatusCode::NOT_FOUND,
                message: format!("Issue {key} does not exist."),
                retry_after: None,
            })
    }

    async fn search_issues(&self, filter: &Value) -> TrackerResult<Vec<Record>> {
        let state = self.state.lock().unwrap();
        if let Some(parent) = filter.get("parent").and_then(Value::as_str) {
            return Ok(state.subtasks.get(parent).cloned().unwrap_or_default());
        }
        Ok(state.issues.clone())
    }

    async fn create_issue(&self, fields: &Value) -> TrackerResult<Record> {
        self.record(Call::CreateIssue(fields.clone()));
        let summary = fields["summary"].as_str().unwrap_or_default().to_string();
        self.check("create_issue", &summary)?;
        Ok(json!({ "key": format!("{summary}2"), "summary": summary }))
    }

    async fn update_issue(&self, key: &str, fields: &Value) -> TrackerResult<Record> {
        self.record(Call::UpdateIssue {
            key: key.to_string(),
            fields: fields.clone(),
        });
        self.check("update_issue", key)?;
        Ok(json!({ "key": key }))
    }

    async fn get_checklist(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.list("get_checklist", key, |s| &s.checklists)
    }

    async fn create_checklist_item(&self, key: &str, text: &str, checked: bool) -> TrackerResult<()> {
        self.record(Call::CreateChecklistItem {
            key: key.to_string(),
            text: text.to_string(),
            checked,
        });
        self.check("create_checklist_item", key)
    }

    async fn get_links(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.list("get_links", key, |s| &s.links)
    }

    async fn create_link(&self, key: &str, relationship: &str, target: &str) -> TrackerResult<()> {
        self.record(Call::CreateLink {
            key: key.to_string(),
            relationship: relationship.to_string(),
            target: target.to_string(),
        });
        self.check("create_link", key)
    }

    async fn get_comments(&self, key: &str) -> TrackerResult<Vec<Record>> {
        self.list("get_comments", key, |s| &s.comments)
    }

    async fn create_comment(&self, key: &str, text: &str) -> TrackerResult<()> {
        self.record(Call::CreateComment {
            key: key.to_string(),
            text: text.to_string(),
        });
        self.check("create_comment", key)
    }
}
