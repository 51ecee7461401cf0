//! Fetch stage: read a whole project into a [`ProjectSnapshot`].
//!
//! Only the project read and the project-wide issue search are fatal. Every
//! per-issue sub-resource failure leaves an empty list and a warning.

use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::pin;
use tokio_util::sync::CancellationToken;

use super::progress::{fetch_phase, MonotonicProgress, Phase, ProgressSink};
use super::snapshot::{ChecklistItem, IssueComment, IssueLink, ProjectSnapshot};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::tracker::{fields, EntityKind, Record, TrackerGateway, TrackerResult, PROJECT_FIELDS};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Sub-resource requests in flight at once
    pub concurrency: usize,
    /// Walk subtasks breadth-first for backends whose project search is not transitive
    pub expand_subtasks: bool,
    pub cancel: CancellationToken,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: config::fetch::DEFAULT_CONCURRENCY,
            expand_subtasks: false,
            cancel: CancellationToken::new(),
        }
    }
}

/// Reads project `project_id` with all its issues and their checklists,
/// links and comments.
///
/// Progress goes through the fetch phase table and ends at exactly 100.
/// Nothing is written to the tracker.
///
/// # Errors
/// Fails when the project cannot be read, the issue search fails, or
/// `options.cancel` fires.
pub async fn fetch_project_snapshot(
    gateway: &dyn TrackerGateway,
    project_id: &str,
    progress: &dyn ProgressSink,
    options: &FetchOptions,
) -> AppResult<ProjectSnapshot> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(AppError::Validation("project id is empty".to_string()));
    }

    let mut progress = MonotonicProgress::new(progress);
    let concurrency = options.concurrency.clamp(1, config::fetch::MAX_CONCURRENCY);
    let cancel = &options.cancel;

    check_cancelled(cancel)?;
    log::info!("Fetching project {}", project_id);
    let project = gateway
        .get_entity(EntityKind::Project, project_id, PROJECT_FIELDS)
        .await?;
    progress.phase(&fetch_phase::PROJECT, 1, 1).await;

    let mut snapshot = ProjectSnapshot::new(project);
    let mut known = HashSet::new();

    check_cancelled(cancel)?;
    let filter_id = fields::short_id(&snapshot.project).unwrap_or_else(|| project_id.to_string());
    let found = gateway.search_issues(&json!({ "project": filter_id })).await?;
    append_new(&mut snapshot, &mut known, found);

    if options.expand_subtasks {
        expand_subtasks(gateway, &mut snapshot, &mut known, cancel).await?;
    }

    for issue in &snapshot.issues {
        if let (Some(child), Some(parent)) = (fields::issue_key(issue), fields::issue_parent_key(issue)) {
            snapshot.parent_child.insert(child, parent);
        }
    }
    log::info!("Project {}: {} issue(s) found", project_id, snapshot.issues.len());
    progress.phase(&fetch_phase::ISSUES, 1, 1).await;

    let keys = snapshot.issue_keys();

    snapshot.checklists = fetch_per_issue(
        &keys,
        "checklist",
        &fetch_phase::CHECKLISTS,
        concurrency,
        cancel,
        &mut progress,
        &mut snapshot.warnings,
        |key| async move {
            gateway
                .get_checklist(&key)
                .await
                .map(|records| records.iter().filter_map(ChecklistItem::from_record).collect::<Vec<_>>())
        },
    )
    .await?;

    snapshot.links = fetch_per_issue(
        &keys,
        "links",
        &fetch_phase::LINKS,
        concurrency,
        cancel,
        &mut progress,
        &mut snapshot.warnings,
        |key| async move {
            gateway
                .get_links(&key)
                .await
                .map(|records| records.iter().filter_map(IssueLink::from_record).collect::<Vec<_>>())
        },
    )
    .await?;

    snapshot.comments = fetch_per_issue(
        &keys,
        "comments",
        &fetch_phase::COMMENTS,
        concurrency,
        cancel,
        &mut progress,
        &mut snapshot.warnings,
        |key| async move {
            gateway
                .get_comments(&key)
                .await
                .map(|records| records.iter().filter_map(IssueComment::from_record).collect::<Vec<_>>())
        },
    )
    .await?;

    close_references(gateway, &mut snapshot, &mut known, cancel, &mut progress).await?;
    progress.finish().await;

    if !snapshot.warnings.is_empty() {
        log::warn!(
            "Project {} fetched with {} warning(s)",
            project_id,
            snapshot.warnings.len()
        );
    }
    Ok(snapshot)
}

fn check_cancelled(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        log::info!("Fetch cancelled");
        return Err(AppError::Cancelled);
    }
    Ok(())
}

/// Appends issues whose key was not seen yet, keeping their order.
fn append_new(snapshot: &mut ProjectSnapshot, known: &mut HashSet<String>, issues: Vec<Record>) -> Vec<String> {
    let mut added = Vec::new();
    for issue in issues {
        let Some(key) = fields::issue_key(&issue) else {
            snapshot.warnings.push("search returned an issue without a key".to_string());
            continue;
        };
        if known.insert(key.clone()) {
            added.push(key);
            snapshot.issues.push(issue);
        }
    }
    added
}

/// Breadth-first walk over subtasks, searching by parent key.
async fn expand_subtasks(
    gateway: &dyn TrackerGateway,
    snapshot: &mut ProjectSnapshot,
    known: &mut HashSet<String>,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let mut queue: VecDeque<String> = snapshot.issue_keys().into();

    while let Some(parent) = queue.pop_front() {
        check_cancelled(cancel)?;
        match gateway.search_issues(&json!({ "parent": parent })).await {
            Ok(children) => queue.extend(append_new(snapshot, known, children)),
            Err(e) => snapshot.warnings.push(format!("subtasks of {}: {}", parent, e)),
        }
    }
    Ok(())
}

/// Fetches one sub-resource list per issue, `concurrency` requests at a
/// time, consuming results in issue order.
#[allow(clippy::too_many_arguments)]
async fn fetch_per_issue<T, F, Fut>(
    keys: &[String],
    what: &str,
    phase: &Phase,
    concurrency: usize,
    cancel: &CancellationToken,
    progress: &mut MonotonicProgress<'_>,
    warnings: &mut Vec<String>,
    fetch: F,
) -> AppResult<BTreeMap<String, Vec<T>>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = TrackerResult<Vec<T>>>,
{
    let total = keys.len();
    let mut collected = BTreeMap::new();

    let mut results = pin!(stream::iter(keys.iter().cloned())
        .map(|key| {
            let request = fetch(key.clone());
            async move { (key, request.await) }
        })
        .buffered(concurrency));

    let mut done = 0;
    while let Some((key, result)) = results.next().await {
        check_cancelled(cancel)?;
        let items = result.unwrap_or_else(|e| {
            log::warn!("Failed to fetch {} of {}: {}", what, key, e);
            warnings.push(format!("{} of {}: {}", what, key, e));
            Vec::new()
        });
        collected.insert(key, items);

        done += 1;
        progress.phase(phase, done, total).await;
    }
    progress.phase(phase, total, total).await;

    Ok(collected)
}

/// Pulls in link targets and parents that the project search did not return.
///
/// Such issues get no sub-resources of their own. Unreachable ones are left
/// out with a warning that tells a missing issue (404) from a failed read;
/// parent entries pointing at them are dropped.
async fn close_references(
    gateway: &dyn TrackerGateway,
    snapshot: &mut ProjectSnapshot,
    known: &mut HashSet<String>,
    cancel: &CancellationToken,
    progress: &mut MonotonicProgress<'_>,
) -> AppResult<()> {
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut queued: HashSet<String> = HashSet::new();

    let link_targets = snapshot.links.values().flatten().map(|link| link.target_key.clone());
    let parents = snapshot.parent_child.values().cloned();
    for key in link_targets.chain(parents).collect::<Vec<_>>() {
        if !known.contains(&key) && queued.insert(key.clone()) {
            pending.push_back(key);
        }
    }

    let mut unreachable = HashSet::new();
    let mut done = 0;
    while let Some(key) = pending.pop_front() {
        check_cancelled(cancel)?;

        match gateway.get_issue(&key).await {
            Ok(issue) => {
                if let Some(parent) = fields::issue_parent_key(&issue) {
                    if !known.contains(&parent) && queued.insert(parent.clone()) {
                        pending.push_back(parent.clone());
                    }
                    snapshot.parent_child.insert(key.clone(), parent);
                }
                known.insert(key);
                snapshot.issues.push(issue);
            }
            Err(e) if e.is_not_found() => {
                log::info!("Referenced issue {} does not exist or is hidden", key);
                snapshot.warnings.push(format!("issue {}: not found", key));
                unreachable.insert(key);
            }
            Err(e) => {
                log::warn!("Referenced issue {} could not be read: {}", key, e);
                snapshot.warnings.push(format!("issue {}: read failed: {}", key, e));
                unreachable.insert(key);
            }
        }

        done += 1;
        progress
            .phase(&fetch_phase::CLOSURE, done, done + pending.len())
            .await;
    }

    snapshot
        .parent_child
        .retain(|child, parent| !unreachable.contains(parent) && !unreachable.contains(child));
    Ok(())
}
