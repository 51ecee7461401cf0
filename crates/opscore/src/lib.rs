//! Opscore - tracker operations toolkit
//!
//! This library provides the tracker gateway and the project cloning engine
//! used by the `opsctl` command line tool.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, metrics, retry and pacing
//! - `tracker`: Tracker gateway trait, REST client, field accessors
//! - `cloning`: Fetch and clone stages, progress contract, results

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cloning;
pub mod core;
pub mod tracker;

// Re-export commonly used types for convenience
pub use cloning::{
    clone_project, fetch_project_snapshot, run_full_clone, CloneOptions, CloneRequest, CloneResult, FetchOptions,
    ProgressSink, ProjectSnapshot,
};
pub use self::core::{config, AppError, AppResult};
pub use tracker::{HttpTracker, TrackerGateway};
