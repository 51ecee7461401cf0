use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use opscore::cloning::{
    clone_project, fetch_project_snapshot, run_full_clone, CloneOptions, CloneRequest, CloneResult, FetchOptions,
    NoProgress, ProgressSink, ProgressThrottler, ProjectSnapshot, ThrottledProgress,
};
use opscore::core::config::{self, TrackerSettings};
use opscore::core::init_logger;
use opscore::tracker::{fields, EntityKind, HttpTracker, TrackerGateway};

mod cli;
mod render;

use cli::{Cli, Commands, FetchArgs, TargetArgs};
use render::TerminalProgress;

/// Main entry point for opsctl
///
/// Parses CLI arguments and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if configuration is missing, the fetch stage fails, or a
/// clone ends unsuccessfully or over its error budget.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logger(&cli.log_level, config::LOG_FILE_PATH.as_deref())?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let quiet = cli.quiet;
    match cli.command {
        Commands::Fetch { project, out, fetch } => run_fetch(&project, out, &fetch, quiet, cancel).await,
        Commands::Clone {
            project,
            target,
            fetch,
            snapshot_out,
        } => run_clone(&project, &target, &fetch, snapshot_out, quiet, cancel).await,
        Commands::Replay { snapshot, target } => run_replay(&snapshot, &target, quiet, cancel).await,
        Commands::List { kind, filter } => run_list(kind.into(), filter.as_deref()).await,
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current item");
            token.cancel();
        }
    });
}

fn connect() -> Result<HttpTracker> {
    let settings = TrackerSettings::from_env()?;
    log::debug!("Tracker API at {}", settings.api_url);
    Ok(HttpTracker::new(settings)?)
}

fn progress_sink(label: &'static str, quiet: bool) -> Box<dyn ProgressSink> {
    if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ThrottledProgress::new(
            TerminalProgress::new(label),
            ProgressThrottler::default(),
        ))
    }
}

fn fetch_options(args: &FetchArgs, cancel: CancellationToken) -> FetchOptions {
    FetchOptions {
        concurrency: args.concurrency,
        expand_subtasks: args.expand_subtasks,
        cancel,
    }
}

async fn run_fetch(
    project: &str,
    out: Option<PathBuf>,
    args: &FetchArgs,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let tracker = connect()?;
    let progress = progress_sink("fetch", quiet);

    let snapshot = fetch_project_snapshot(&tracker, project, progress.as_ref(), &fetch_options(args, cancel)).await?;
    eprintln!("{}", render::snapshot_summary(&snapshot));

    match out {
        Some(path) => save_snapshot(&snapshot, &path).await,
        None => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn run_clone(
    project: &str,
    target: &TargetArgs,
    args: &FetchArgs,
    snapshot_out: Option<PathBuf>,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let tracker = connect()?;
    let progress = progress_sink("clone", quiet);
    let request = CloneRequest {
        project_id: project,
        new_name: &target.name,
        queue: &target.queue,
    };
    let clone_options = CloneOptions { cancel: cancel.clone() };

    let (snapshot, result) = run_full_clone(
        &tracker,
        &request,
        progress.as_ref(),
        &fetch_options(args, cancel),
        &clone_options,
    )
    .await?;

    if let Some(path) = snapshot_out {
        save_snapshot(&snapshot, &path).await?;
    }
    report(&result, target)
}

async fn run_replay(snapshot_path: &Path, target: &TargetArgs, quiet: bool, cancel: CancellationToken) -> Result<()> {
    let snapshot = ProjectSnapshot::load(snapshot_path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", snapshot_path.display()))?;
    log::info!(
        "Replaying {} with {} issue(s)",
        snapshot_path.display(),
        snapshot.issues.len()
    );

    let tracker = connect()?;
    let progress = progress_sink("clone", quiet);
    let result = clone_project(
        &tracker,
        &snapshot,
        &target.name,
        &target.queue,
        progress.as_ref(),
        &CloneOptions { cancel },
    )
    .await;

    report(&result, target)
}

async fn run_list(kind: EntityKind, filter: Option<&str>) -> Result<()> {
    let filter = filter
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--filter must be a JSON object")?;

    let tracker = connect()?;
    let entities = tracker
        .search_entities(kind, filter.as_ref(), &["summary", "entityStatus"])
        .await?;

    for entity in &entities {
        println!(
            "{}\t{}\t{}",
            fields::entity_id(entity).unwrap_or_default(),
            fields::short_id(entity).unwrap_or_default(),
            fields::entity_name(entity).unwrap_or_default()
        );
    }
    log::info!("{} {}(s) found", entities.len(), kind);
    Ok(())
}

async fn save_snapshot(snapshot: &ProjectSnapshot, path: &Path) -> Result<()> {
    snapshot
        .save(path)
        .await
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    eprintln!("Snapshot written to {}", path.display());
    Ok(())
}

/// Prints the result and turns the caller's policy into an exit status.
fn report(result: &CloneResult, target: &TargetArgs) -> Result<()> {
    if target.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", render::clone_report(result));
    }

    if !result.success {
        anyhow::bail!("project \"{}\" was not created", result.project_name);
    }
    if let Some(max_errors) = target.max_errors {
        if !result.within_error_budget(max_errors) {
            anyhow::bail!(
                "{} error(s) during clone, more than the allowed {}",
                result.errors.len(),
                max_errors
            );
        }
    }
    if result.cancelled {
        anyhow::bail!("clone cancelled");
    }
    Ok(())
}
