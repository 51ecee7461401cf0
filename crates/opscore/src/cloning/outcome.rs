//! Per-item outcomes and their aggregation into a [`CloneResult`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::metrics;

/// What happened to one item of the clone stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Done,
    /// Nothing to do, e.g. a reference to an issue that was not copied
    Skipped(String),
    Failed(String),
}

impl ItemOutcome {
    pub fn failed(reason: impl fmt::Display) -> Self {
        ItemOutcome::Failed(reason.to_string())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        ItemOutcome::Skipped(reason.into())
    }

    fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Done => "done",
            ItemOutcome::Skipped(_) => "skipped",
            ItemOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClonePhase {
    Project,
    Issues,
    Followers,
    Parents,
    Checklists,
    Links,
    Comments,
}

impl ClonePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ClonePhase::Project => "project",
            ClonePhase::Issues => "issues",
            ClonePhase::Followers => "followers",
            ClonePhase::Parents => "parents",
            ClonePhase::Checklists => "checklists",
            ClonePhase::Links => "links",
            ClonePhase::Comments => "comments",
        }
    }
}

impl fmt::Display for ClonePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseStats {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PhaseStats {
    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

/// Tallies per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloneStats(BTreeMap<ClonePhase, PhaseStats>);

impl CloneStats {
    pub fn get(&self, phase: ClonePhase) -> PhaseStats {
        self.0.get(&phase).copied().unwrap_or_default()
    }

    pub fn failed(&self) -> usize {
        self.0.values().map(|s| s.failed).sum()
    }

    fn add(&mut self, phase: ClonePhase, outcome: &ItemOutcome) {
        let stats = self.0.entry(phase).or_default();
        match outcome {
            ItemOutcome::Done => stats.done += 1,
            ItemOutcome::Skipped(_) => stats.skipped += 1,
            ItemOutcome::Failed(_) => stats.failed += 1,
        }
    }
}

/// Old issue key -> new issue key.
///
/// A key is present only if its copy was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyMapping(BTreeMap<String, String>);

impl KeyMapping {
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.0.insert(old.into(), new.into());
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.0.get(old).map(String::as_str)
    }

    pub fn contains(&self, old: &str) -> bool {
        self.0.contains_key(old)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outcome of one clone stage run.
///
/// `success` means the destination project was established. It does not
/// promise that every issue or sub-resource was copied; see `errors`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CloneResult {
    pub success: bool,
    pub project_id: Option<String>,
    pub project_short_id: Option<String>,
    pub project_name: String,
    pub mapping: KeyMapping,
    pub errors: Vec<String>,
    pub stats: CloneStats,
    pub cancelled: bool,
}

impl CloneResult {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    /// Tallies `outcome`; failures are appended to `errors`.
    pub fn record(&mut self, phase: ClonePhase, outcome: ItemOutcome) {
        metrics::CLONE_ITEMS_TOTAL
            .with_label_values(&[phase.as_str(), outcome.label()])
            .inc();
        self.stats.add(phase, &outcome);

        match outcome {
            ItemOutcome::Failed(reason) => {
                log::warn!("Clone {} failed: {}", phase, reason);
                self.errors.push(reason);
            }
            ItemOutcome::Skipped(reason) => log::debug!("Clone {} skipped: {}", phase, reason),
            ItemOutcome::Done => {}
        }
    }

    /// Number of issues copied.
    pub fn created_count(&self) -> usize {
        self.mapping.len()
    }

    /// Stricter caller policy: successful and at most `max_errors` errors.
    pub fn within_error_budget(&self, max_errors: usize) -> bool {
        self.success && self.errors.len() <= max_errors
    }

    /// One-paragraph report for humans.
    pub fn summary(&self) -> String {
        let mut s = String::new();
        if self.success {
            s.push_str(&format!("Project \"{}\" created", self.project_name));
            if let Some(short_id) = &self.project_short_id {
                s.push_str(&format!(" (#{})", short_id));
            }
            s.push_str(&format!(", {} issue(s) copied", self.created_count()));
        } else {
            s.push_str(&format!("Project \"{}\" was not created", self.project_name));
        }
        if self.cancelled {
            s.push_str(", cancelled before completion");
        }
        if !self.errors.is_empty() {
            s.push_str(&format!(".\nErrors ({}):\n", self.errors.len()));
            s.push_str(&self.errors.join("\n"));
        }
        s
    }
}
