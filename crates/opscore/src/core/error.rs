use thiserror::Error;

use crate::tracker::TrackerError;

/// Centralized error types for the application
///
/// All errors that escape a stage are converted to this enum for consistent
/// error handling. Per-item failures inside the clone stage never become an
/// `AppError`; they are folded into `CloneResult::errors` instead.
///
/// # Example
///
/// ```no_run
/// use opscore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Remote tracker errors
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// JSON (de)serialization errors, e.g. a saved snapshot
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation was cancelled between two items
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Returns category for metrics and log lines
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Tracker(_) => "tracker",
            AppError::Json(_) => "json",
            AppError::Io(_) => "io",
            AppError::Url(_) => "url",
            AppError::Anyhow(_) => "other",
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::Cancelled => "cancelled",
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
