//! Clone stage: recreate a [`ProjectSnapshot`] as a new project.
//!
//! Only project creation is fatal. Every later item is attempted on its own
//! and reported as an [`ItemOutcome`]; references to issues that were not
//! copied are skipped without touching the tracker.

use serde_json::json;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

use super::outcome::{ClonePhase, CloneResult, ItemOutcome};
use super::progress::{clone_phase, MonotonicProgress, ProgressSink};
use super::snapshot::{IssueLink, ProjectSnapshot};
use crate::tracker::{fields, EntityKind, IssueDraft, ProjectDraft, TrackerError, TrackerGateway};

/// Relationship used when a link carries none.
pub const DEFAULT_RELATIONSHIP: &str = "relates";

/// Relationships that read the same from either end.
const SYMMETRIC_RELATIONSHIPS: &[&str] = &["relates"];

/// Forward and backward names of one link. Only used for records that carry
/// no `direction`, which name the link as seen from their own end.
const INVERSE_RELATIONSHIPS: &[(&str, &str)] = &[
    ("depends on", "is dependent by"),
    ("duplicates", "is duplicated by"),
    ("is subtask for", "is parent task for"),
    ("is epic of", "has epic"),
    ("clones", "is cloned by"),
];

#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub cancel: CancellationToken,
}

/// Creates project `new_name` with copies of every issue of `snapshot` in
/// `queue`, then restores parents, checklists, links and comments between
/// the copies.
///
/// Never fails as a whole: look at `success`, `errors` and `cancelled` of
/// the returned [`CloneResult`]. Progress ends at exactly 100.
pub async fn clone_project(
    gateway: &dyn TrackerGateway,
    snapshot: &ProjectSnapshot,
    new_name: &str,
    queue: &str,
    progress: &dyn ProgressSink,
    options: &CloneOptions,
) -> CloneResult {
    let mut cloner = Cloner {
        gateway,
        snapshot,
        queue: queue.trim(),
        cancel: &options.cancel,
        progress: MonotonicProgress::new(progress),
        result: CloneResult::new(new_name.trim()),
    };
    cloner.run().await;

    let Cloner {
        mut progress, result, ..
    } = cloner;
    progress.finish().await;

    log::info!(
        "Clone of \"{}\" finished: success={}, {} issue(s), {} error(s)",
        result.project_name,
        result.success,
        result.created_count(),
        result.errors.len()
    );
    result
}

struct Cloner<'a> {
    gateway: &'a dyn TrackerGateway,
    snapshot: &'a ProjectSnapshot,
    queue: &'a str,
    cancel: &'a CancellationToken,
    progress: MonotonicProgress<'a>,
    result: CloneResult,
}

/// `false` once the stage was cancelled.
type Continue = bool;

impl Cloner<'_> {
    async fn run(&mut self) {
        if self.result.project_name.is_empty() || self.queue.is_empty() {
            self.result.record(
                ClonePhase::Project,
                ItemOutcome::failed("project name and target queue are required"),
            );
            return;
        }

        let Some(short_id) = self.create_project().await else {
            return;
        };
        self.progress.phase(&clone_phase::PROJECT, 1, 1).await;

        // Parents and links need every issue created first.
        if !self.create_issues(&short_id).await {
            return;
        }
        if !self.restore_parents().await || !self.restore_checklists().await {
            return;
        }
        if self.restore_links().await {
            self.restore_comments().await;
        }
    }

    fn check_cancelled(&mut self) -> Continue {
        if !self.cancel.is_cancelled() {
            return true;
        }
        if !self.result.cancelled {
            log::info!("Clone of \"{}\" cancelled", self.result.project_name);
            self.result.cancelled = true;
            self.result.errors.push("clone cancelled".to_string());
        }
        false
    }

    /// Returns the reference issues attach to: the short id, else the id.
    async fn create_project(&mut self) -> Option<String> {
        if !self.check_cancelled() {
            return None;
        }

        let draft = ProjectDraft::from_source(&self.snapshot.project, &self.result.project_name);
        let created = self
            .gateway
            .create_entity(EntityKind::Project, &draft.to_fields())
            .await
            .and_then(|record| {
                let id = fields::entity_id(&record).ok_or(TrackerError::MissingField {
                    entity: "project",
                    field: "id",
                })?;
                Ok((id, fields::short_id(&record)))
            });

        match created {
            Ok((id, short_id)) => {
                log::info!("Project \"{}\" created: id={}", self.result.project_name, id);
                let reference = short_id.clone().unwrap_or_else(|| id.clone());
                self.result.project_id = Some(id);
                self.result.project_short_id = short_id;
                self.result.success = true;
                self.result.record(ClonePhase::Project, ItemOutcome::Done);
                Some(reference)
            }
            Err(e) => {
                let reason = format!("project creation failed: {}", e);
                self.result.record(ClonePhase::Project, ItemOutcome::Failed(reason));
                None
            }
        }
    }

    async fn create_issues(&mut self, project: &str) -> Continue {
        let snapshot = self.snapshot;
        let total = snapshot.issues.len();

        for (i, issue) in snapshot.issues.iter().enumerate() {
            if !self.check_cancelled() {
                return false;
            }

            let Some(old_key) = fields::issue_key(issue) else {
                self.result
                    .record(ClonePhase::Issues, ItemOutcome::skipped("source issue without a key"));
                continue;
            };

            let draft = IssueDraft::from_source(issue, self.queue, Some(project));
            let created = self
                .gateway
                .create_issue(&draft.to_fields())
                .await
                .and_then(|record| {
                    fields::issue_key(&record).ok_or(TrackerError::MissingField {
                        entity: "issue",
                        field: "key",
                    })
                });

            match created {
                Ok(new_key) => {
                    log::debug!("Issue {} copied as {}", old_key, new_key);
                    self.result.mapping.insert(old_key.as_str(), new_key.as_str());
                    self.result.record(ClonePhase::Issues, ItemOutcome::Done);

                    let followers = fields::issue_follower_ids(issue);
                    if !followers.is_empty() {
                        let outcome = match self
                            .gateway
                            .update_issue(&new_key, &json!({ "followers": followers }))
                            .await
                        {
                            Ok(_) => ItemOutcome::Done,
                            Err(e) => ItemOutcome::failed(format!("followers of {}: {}", new_key, e)),
                        };
                        self.result.record(ClonePhase::Followers, outcome);
                    }
                }
                Err(e) => {
                    self.result
                        .record(ClonePhase::Issues, ItemOutcome::failed(format!("issue {}: {}", old_key, e)));
                }
            }

            self.progress.phase(&clone_phase::ISSUES, i + 1, total).await;
        }
        true
    }

    async fn restore_parents(&mut self) -> Continue {
        let snapshot = self.snapshot;
        let total = snapshot.parent_child.len();

        for (i, (child, parent)) in snapshot.parent_child.iter().enumerate() {
            if !self.check_cancelled() {
                return false;
            }

            let outcome = match (self.result.mapping.get(child), self.result.mapping.get(parent)) {
                (Some(new_child), Some(new_parent)) => {
                    let body = json!({ "parent": { "key": new_parent } });
                    match self.gateway.update_issue(new_child, &body).await {
                        Ok(_) => ItemOutcome::Done,
                        Err(e) => ItemOutcome::failed(format!("parent of {}: {}", new_child, e)),
                    }
                }
                _ => ItemOutcome::skipped(format!("{} -> {}: not copied", child, parent)),
            };
            self.result.record(ClonePhase::Parents, outcome);

            self.progress.phase(&clone_phase::PARENTS, i + 1, total).await;
        }
        true
    }

    async fn restore_checklists(&mut self) -> Continue {
        let snapshot = self.snapshot;
        let total = snapshot.checklists.len();

        for (i, (key, items)) in snapshot.checklists.iter().enumerate() {
            if !self.check_cancelled() {
                return false;
            }

            match self.result.mapping.get(key).map(str::to_string) {
                Some(new_key) => {
                    for item in items {
                        let outcome = match self
                            .gateway
                            .create_checklist_item(&new_key, &item.text, item.checked)
                            .await
                        {
                            Ok(()) => ItemOutcome::Done,
                            Err(e) => ItemOutcome::failed(format!("checklist item on {}: {}", new_key, e)),
                        };
                        self.result.record(ClonePhase::Checklists, outcome);
                    }
                }
                None if !items.is_empty() => {
                    self.result
                        .record(ClonePhase::Checklists, ItemOutcome::skipped(format!("{}: not copied", key)));
                }
                None => {}
            }

            self.progress.phase(&clone_phase::CHECKLISTS, i + 1, total).await;
        }
        true
    }

    async fn restore_links(&mut self) -> Continue {
        let snapshot = self.snapshot;
        let total = snapshot.links.len();
        let mut created = HashSet::new();

        for (i, (owner, links)) in snapshot.links.iter().enumerate() {
            if !self.check_cancelled() {
                return false;
            }

            for link in links {
                let outcome = self.restore_link(owner, link, &mut created).await;
                self.result.record(ClonePhase::Links, outcome);
            }

            self.progress.phase(&clone_phase::LINKS, i + 1, total).await;
        }
        true
    }

    async fn restore_link(
        &self,
        owner: &str,
        link: &IssueLink,
        created: &mut HashSet<(String, String, String)>,
    ) -> ItemOutcome {
        let link = OrientedLink::new(owner, link);

        let (Some(new_from), Some(new_to)) = (
            self.result.mapping.get(link.from),
            self.result.mapping.get(link.to),
        ) else {
            return ItemOutcome::skipped(format!("{} -> {}: not copied", link.from, link.to));
        };

        if is_parent_relationship(link.relationship) && self.is_parent_pair(link.from, link.to) {
            return ItemOutcome::skipped(format!("{} -> {}: restored as parent", link.from, link.to));
        }

        if !created.insert(link.identity()) {
            return ItemOutcome::skipped(format!("{} -> {}: already linked", link.from, link.to));
        }

        match self.gateway.create_link(new_from, link.relationship, new_to).await {
            Ok(()) => ItemOutcome::Done,
            Err(e) => ItemOutcome::failed(format!("link {} -> {}: {}", new_from, new_to, e)),
        }
    }

    fn is_parent_pair(&self, a: &str, b: &str) -> bool {
        let parent_of = |child: &str| self.snapshot.parent_child.get(child).map(String::as_str);
        parent_of(a) == Some(b) || parent_of(b) == Some(a)
    }

    async fn restore_comments(&mut self) -> Continue {
        let snapshot = self.snapshot;
        let total = snapshot.comments.len();

        for (i, (key, comments)) in snapshot.comments.iter().enumerate() {
            if !self.check_cancelled() {
                return false;
            }

            match self.result.mapping.get(key).map(str::to_string) {
                Some(new_key) => {
                    for comment in comments {
                        let outcome = match self.gateway.create_comment(&new_key, &comment.text).await {
                            Ok(()) => ItemOutcome::Done,
                            Err(e) => ItemOutcome::failed(format!("comment on {}: {}", new_key, e)),
                        };
                        self.result.record(ClonePhase::Comments, outcome);
                    }
                }
                None if !comments.is_empty() => {
                    self.result
                        .record(ClonePhase::Comments, ItemOutcome::skipped(format!("{}: not copied", key)));
                }
                None => {}
            }

            self.progress.phase(&clone_phase::COMMENTS, i + 1, total).await;
        }
        true
    }
}

fn is_parent_relationship(relationship: &str) -> bool {
    matches!(relationship, "is subtask for" | "is parent task for" | "subtask" | "parent")
}

fn inverse_relationship(relationship: &str) -> Option<&'static str> {
    INVERSE_RELATIONSHIPS.iter().find_map(|&(forward, backward)| {
        if relationship == forward {
            Some(backward)
        } else if relationship == backward {
            Some(forward)
        } else {
            None
        }
    })
}

fn is_backward_name(relationship: &str) -> bool {
    INVERSE_RELATIONSHIPS.iter().any(|&(_, backward)| relationship == backward)
}

/// A link as created from its outward end: `from <relationship> to`.
#[derive(Debug, PartialEq, Eq)]
struct OrientedLink<'a> {
    from: &'a str,
    relationship: &'a str,
    to: &'a str,
}

impl<'a> OrientedLink<'a> {
    fn new(owner: &'a str, link: &'a IssueLink) -> Self {
        let relationship = link.relationship.as_deref().unwrap_or(DEFAULT_RELATIONSHIP);
        let target = link.target_key.as_str();

        match link.direction.as_deref() {
            Some("inward") => Self {
                from: target,
                relationship,
                to: owner,
            },
            None if is_backward_name(relationship) => Self {
                from: target,
                relationship: inverse_relationship(relationship).unwrap_or(relationship),
                to: owner,
            },
            _ => Self {
                from: owner,
                relationship,
                to: target,
            },
        }
    }

    /// Same value for a link whichever end it was read from.
    fn identity(&self) -> (String, String, String) {
        let (from, to) = if SYMMETRIC_RELATIONSHIPS.contains(&self.relationship) && self.to < self.from {
            (self.to, self.from)
        } else {
            (self.from, self.to)
        };
        (from.to_string(), self.relationship.to_string(), to.to_string())
    }
}
