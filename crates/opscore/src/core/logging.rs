//! Logging initialization
//!
//! The code base logs through the `log` facade. This module installs a
//! `tracing-subscriber` formatter as the global sink and bridges `log`
//! records into it, optionally mirroring everything to a plain log file.

use anyhow::Result;
use std::fs::File;
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logger for console and (optionally) file output
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to this
/// workspace's crates and `warn` to everything else.
///
/// # Arguments
/// * `default_level` - Level used when RUST_LOG is not set (e.g. "info")
/// * `log_file_path` - Optional path of a log file to create
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or install the logger
pub fn init_logger(default_level: &str, log_file_path: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(default_level)))?;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal());

    let registry = tracing_subscriber::registry().with(env_filter).with(console);

    tracing_log::LogTracer::init().map_err(|e| anyhow::anyhow!("Failed to bridge log records: {}", e))?;

    if let Some(path) = log_file_path {
        let file = File::create(path).map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", path, e))?;
        let file_layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        tracing::subscriber::set_global_default(registry.with(file_layer))?;
    } else {
        tracing::subscriber::set_global_default(registry)?;
    }

    Ok(())
}

fn default_filter(level: &str) -> String {
    format!("warn,opscore={level},opsctl={level}")
}
