//! Terminal rendering of progress and results.

use async_trait::async_trait;
use opscore::cloning::{ClonePhase, CloneResult, ProgressSink, ProjectSnapshot};
use std::io::Write;

/// Progress line on stderr, redrawn in place.
pub struct TerminalProgress {
    label: &'static str,
}

impl TerminalProgress {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

#[async_trait]
impl ProgressSink for TerminalProgress {
    async fn report(&self, value: f64) {
        let line = progress_line(self.label, value);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{line}");
        if value >= 100.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn progress_line(label: &str, value: f64) -> String {
    let percent = value.clamp(0.0, 100.0).round() as u8;
    format!("{label:<6} {} {percent:>3}%", create_progress_bar(percent))
}

/// Creates a visual progress bar
fn create_progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = (progress / 5) as usize;
    let empty = 20 - filled;

    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

pub fn snapshot_summary(snapshot: &ProjectSnapshot) -> String {
    let checklist_items: usize = snapshot.checklists.values().map(Vec::len).sum();
    let comments: usize = snapshot.comments.values().map(Vec::len).sum();

    let mut s = format!(
        "{}: {} issue(s), {} parent link(s), {} link(s), {} checklist item(s), {} comment(s)",
        snapshot.project_name().unwrap_or_else(|| "project".to_string()),
        snapshot.issues.len(),
        snapshot.parent_child.len(),
        snapshot.link_count(),
        checklist_items,
        comments
    );
    if !snapshot.warnings.is_empty() {
        s.push_str(&format!("\nWarnings ({}):\n", snapshot.warnings.len()));
        s.push_str(&snapshot.warnings.join("\n"));
    }
    s
}

/// Result summary followed by a per-phase table.
pub fn clone_report(result: &CloneResult) -> String {
    const PHASES: [ClonePhase; 7] = [
        ClonePhase::Project,
        ClonePhase::Issues,
        ClonePhase::Followers,
        ClonePhase::Parents,
        ClonePhase::Checklists,
        ClonePhase::Links,
        ClonePhase::Comments,
    ];

    let mut s = result.summary();
    s.push_str("\n\nphase        done  skipped  failed");
    for phase in PHASES {
        let stats = result.stats.get(phase);
        if stats.total() == 0 {
            continue;
        }
        s.push_str(&format!(
            "\n{:<11} {:>5} {:>8} {:>7}",
            phase.as_str(),
            stats.done,
            stats.skipped,
            stats.failed
        ));
    }
    s
}
