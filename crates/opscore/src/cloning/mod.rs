//! Project cloning engine.
//!
//! Two independent stages:
//! - [`fetch_project_snapshot`] reads a project tree into a [`ProjectSnapshot`]
//! - [`clone_project`] recreates a snapshot as a new project
//!
//! Each stage reports its own 0..100 progress. [`run_full_clone`] chains
//! them and rescales both into one bar.

pub mod fetch;
pub mod outcome;
pub mod progress;
pub mod replay;
pub mod snapshot;

pub use fetch::{fetch_project_snapshot, FetchOptions};
pub use outcome::{ClonePhase, CloneResult, CloneStats, ItemOutcome, KeyMapping, PhaseStats};
pub use progress::{
    AsyncFnProgress, FnProgress, MonotonicProgress, NoProgress, Phase, ProgressSink, ProgressThrottler,
    ScaledProgress, ThrottledProgress, CLONE_PHASES, FETCH_PHASES,
};
pub use replay::{clone_project, CloneOptions};
pub use snapshot::{ChecklistItem, IssueComment, IssueLink, ProjectSnapshot};

use crate::core::config;
use crate::core::error::AppResult;
use crate::tracker::TrackerGateway;

/// What to copy and where.
#[derive(Debug, Clone)]
pub struct CloneRequest<'a> {
    pub project_id: &'a str,
    pub new_name: &'a str,
    pub queue: &'a str,
}

/// Fetches `request.project_id` and clones it, reporting fetch on `[0, 50]`
/// and clone on `[50, 100]` of `progress`.
///
/// The snapshot is returned alongside the result so a caller can keep it
/// and retry the clone stage alone.
///
/// # Errors
/// Only fetch-stage failures; clone-stage problems end up in the result.
pub async fn run_full_clone(
    gateway: &dyn TrackerGateway,
    request: &CloneRequest<'_>,
    progress: &dyn ProgressSink,
    fetch_options: &FetchOptions,
    clone_options: &CloneOptions,
) -> AppResult<(ProjectSnapshot, CloneResult)> {
    let split = config::progress::FETCH_SHARE;

    let fetch_progress = ScaledProgress::new(progress, 0.0, split);
    let snapshot = fetch_project_snapshot(gateway, request.project_id, &fetch_progress, fetch_options).await?;

    log::info!(
        "Snapshot of {}: {} issue(s), {} link(s), {} warning(s)",
        request.project_id,
        snapshot.issues.len(),
        snapshot.link_count(),
        snapshot.warnings.len()
    );

    let clone_progress = ScaledProgress::new(progress, split, 100.0);
    let result = clone_project(
        gateway,
        &snapshot,
        request.new_name,
        request.queue,
        &clone_progress,
        clone_options,
    )
    .await;

    Ok((snapshot, result))
}
