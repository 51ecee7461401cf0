use clap::{Parser, Subcommand, ValueEnum};
use opscore::config;
use opscore::tracker::EntityKind;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "opsctl")]
#[command(author, version, about = "Fetch and clone tracker projects", long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "OPSCTL_LOG", default_value = "info")]
    pub log_level: String,

    /// Do not draw the progress bar
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a project with its issues into a snapshot file
    Fetch {
        /// Id of the source project
        project: String,

        /// Where to write the snapshot (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Fetch a project and recreate it under a new name
    Clone {
        /// Id of the source project
        project: String,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Also keep the fetched snapshot here
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },

    /// Clone again from a saved snapshot
    Replay {
        /// Snapshot file written by `fetch` or `clone --snapshot-out`
        snapshot: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// List projects, portfolios or goals
    List {
        #[arg(long, value_enum, default_value_t = KindArg::Project)]
        kind: KindArg,

        /// Search filter as a JSON object, e.g. '{"entityStatus": "in_progress"}'
        #[arg(long)]
        filter: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct FetchArgs {
    /// Sub-resource requests in flight at once
    #[arg(long, default_value_t = config::fetch::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Walk subtasks one level at a time instead of trusting the project search
    #[arg(long)]
    pub expand_subtasks: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Name of the new project
    #[arg(long)]
    pub name: String,

    /// Queue receiving the copied issues
    #[arg(long)]
    pub queue: String,

    /// Fail when more items than this could not be copied
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Project,
    Portfolio,
    Goal,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Project => EntityKind::Project,
            KindArg::Portfolio => EntityKind::Portfolio,
            KindArg::Goal => EntityKind::Goal,
        }
    }
}

impl Cli {
    /// Loads `.env`, then parses the command line, so env-backed flags
    /// (`OPSCTL_LOG`) can come from the file.
    pub fn parse_args() -> Self {
        load_env_file(None);
        Self::parse()
    }
}

/// Missing files are fine; variables already set are kept.
fn load_env_file(path: Option<&Path>) {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    if let Err(e) = loaded {
        if !e.not_found() {
            eprintln!("Ignoring .env: {e}");
        }
    }
}
