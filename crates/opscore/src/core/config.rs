use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::core::error::{AppError, AppResult};

/// Base URL of the tracker REST API
/// Read from TRACKER_API_URL environment variable
/// Default: https://api.tracker.yandex.net
pub static TRACKER_API_URL: Lazy<String> =
    Lazy::new(|| env::var("TRACKER_API_URL").unwrap_or_else(|_| "https://api.tracker.yandex.net".to_string()));

/// OAuth token for the tracker API
/// Read from TRACKER_TOKEN environment variable
pub static TRACKER_TOKEN: Lazy<String> = Lazy::new(|| env::var("TRACKER_TOKEN").unwrap_or_default());

/// Organization id (Yandex 360 organizations)
/// Read from TRACKER_ORG_ID environment variable
pub static TRACKER_ORG_ID: Lazy<Option<String>> =
    Lazy::new(|| env::var("TRACKER_ORG_ID").ok().filter(|v| !v.is_empty()));

/// Cloud organization id (Yandex Cloud organizations)
/// Read from TRACKER_CLOUD_ORG_ID environment variable
/// Used only when TRACKER_ORG_ID is not set
pub static TRACKER_CLOUD_ORG_ID: Lazy<Option<String>> =
    Lazy::new(|| env::var("TRACKER_CLOUD_ORG_ID").ok().filter(|v| !v.is_empty()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: none (console only)
pub static LOG_FILE_PATH: Lazy<Option<String>> =
    Lazy::new(|| env::var("LOG_FILE_PATH").ok().filter(|v| !v.is_empty()));

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for tracker HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Connect timeout (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 15;

    /// Minimal spacing between two tracker requests (in milliseconds)
    /// The tracker answers 429 well before hourly quotas when bursted
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 50;

    /// Page size for paginated searches
    pub const PAGE_SIZE: u32 = 100;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    /// Connect timeout duration
    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }

    /// Request spacing duration
    pub fn min_request_interval() -> Duration {
        Duration::from_millis(MIN_REQUEST_INTERVAL_MS)
    }
}

/// Retry configuration for tracker calls
pub mod retry {
    use super::Duration;

    /// Maximum number of retries after the first attempt
    pub const MAX_RETRIES: u32 = 3;

    /// Delay before the first retry (in milliseconds)
    pub const INITIAL_DELAY_MS: u64 = 500;

    /// Upper bound for a single backoff delay (in seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Initial delay duration
    pub fn initial_delay() -> Duration {
        Duration::from_millis(INITIAL_DELAY_MS)
    }

    /// Maximum delay duration
    pub fn max_delay() -> Duration {
        Duration::from_secs(MAX_DELAY_SECS)
    }
}

/// Fetch stage configuration
pub mod fetch {
    /// Sub-resource requests in flight at once (checklists, links, comments)
    pub const DEFAULT_CONCURRENCY: usize = 1;

    /// Upper bound accepted from callers
    pub const MAX_CONCURRENCY: usize = 16;
}

/// Progress rendering configuration
pub mod progress {
    use super::Duration;

    /// Minimal interval between two rendered progress updates (in milliseconds)
    pub const RENDER_INTERVAL_MS: u64 = 1000;

    /// Share of the overall bar taken by the fetch stage (the clone stage gets the rest)
    pub const FETCH_SHARE: f64 = 50.0;

    /// Render interval duration
    pub fn render_interval() -> Duration {
        Duration::from_millis(RENDER_INTERVAL_MS)
    }
}

/// How requests identify the organization they act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgId {
    /// `X-Org-ID` header
    Org(String),
    /// `X-Cloud-Org-ID` header
    Cloud(String),
}

impl OrgId {
    /// Header name carrying this id
    pub fn header_name(&self) -> &'static str {
        match self {
            OrgId::Org(_) => "X-Org-ID",
            OrgId::Cloud(_) => "X-Cloud-Org-ID",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            OrgId::Org(id) | OrgId::Cloud(id) => id,
        }
    }
}

/// Connection settings for the HTTP tracker client.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub api_url: String,
    pub token: String,
    pub org: OrgId,
}

impl TrackerSettings {
    /// Builds settings from the environment statics above.
    ///
    /// # Errors
    /// Returns `AppError::Config` when the token or both organization ids are missing.
    pub fn from_env() -> AppResult<Self> {
        Self::new(
            TRACKER_API_URL.as_str(),
            TRACKER_TOKEN.as_str(),
            TRACKER_ORG_ID.clone(),
            TRACKER_CLOUD_ORG_ID.clone(),
        )
    }

    /// Validates explicit settings. `org_id` wins over `cloud_org_id`.
    pub fn new(
        api_url: &str,
        token: &str,
        org_id: Option<String>,
        cloud_org_id: Option<String>,
    ) -> AppResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Config("TRACKER_TOKEN is not set".to_string()));
        }

        let org = match (org_id, cloud_org_id) {
            (Some(id), _) if !id.trim().is_empty() => OrgId::Org(id.trim().to_string()),
            (_, Some(id)) if !id.trim().is_empty() => OrgId::Cloud(id.trim().to_string()),
            _ => {
                return Err(AppError::Config(
                    "either TRACKER_ORG_ID or TRACKER_CLOUD_ORG_ID must be set".to_string(),
                ))
            }
        };

        let api_url = api_url.trim().trim_end_matches('/').to_string();
        url::Url::parse(&api_url)?;

        Ok(Self {
            api_url,
            token: token.to_string(),
            org,
        })
    }
}
