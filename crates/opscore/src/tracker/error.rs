use std::time::Duration;
use thiserror::Error;

use crate::core::retry::Retryable;

/// Errors returned by a [`TrackerGateway`](super::TrackerGateway) call.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracker answered with a non-success status
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: &'static str,
        status: reqwest::StatusCode,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The body could not be understood
    #[error("unexpected response for {operation}: {message}")]
    Decode { operation: &'static str, message: String },

    /// A record lacks a field the caller cannot do without
    #[error("{entity} response has no {field}")]
    MissingField { entity: &'static str, field: &'static str },

    /// Refusal reported by a gateway that does not speak HTTP (tests, fakes)
    #[error("{0}")]
    Rejected(String),
}

impl TrackerError {
    /// HTTP status, if the tracker answered at all
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            TrackerError::Status { status, .. } => Some(*status),
            TrackerError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// 404: the issue does not exist or the token cannot see it
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(reqwest::StatusCode::NOT_FOUND)
    }
}

impl Retryable for TrackerError {
    fn is_transient(&self) -> bool {
        match self {
            TrackerError::Http(e) => e.is_timeout() || e.is_connect() || e.status().is_some_and(is_transient_status),
            TrackerError::Status { status, .. } => is_transient_status(*status),
            TrackerError::Decode { .. } | TrackerError::MissingField { .. } | TrackerError::Rejected(_) => false,
        }
    }

    /// A refused connection never carried the request; a 429 is answered
    /// before the tracker acts on it.
    fn was_not_applied(&self) -> bool {
        match self {
            TrackerError::Http(e) => e.is_connect(),
            TrackerError::Status { status, .. } => *status == reqwest::StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            TrackerError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Type alias for Result with TrackerError
pub type TrackerResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::Idempotency;
    use reqwest::StatusCode;

    fn status_error(status: StatusCode, retry_after: Option<Duration>) -> TrackerError {
        TrackerError::Status {
            operation: "get_issue",
            status,
            message: "boom".to_string(),
            retry_after,
        }
    }

    #[test]
    fn test_transient_statuses() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, None).is_transient());
        assert!(status_error(StatusCode::BAD_GATEWAY, None).is_transient());
        assert!(!status_error(StatusCode::NOT_FOUND, None).is_transient());
        assert!(!status_error(StatusCode::FORBIDDEN, None).is_transient());
        assert!(!TrackerError::Rejected("nope".to_string()).is_transient());
    }

    #[test]
    fn test_creations_retry_only_when_not_applied() {
        let throttled = status_error(StatusCode::TOO_MANY_REQUESTS, None);
        let unavailable = status_error(StatusCode::SERVICE_UNAVAILABLE, None);

        assert!(throttled.should_retry(Idempotency::NonIdempotent));
        assert!(!unavailable.should_retry(Idempotency::NonIdempotent));
        assert!(unavailable.should_retry(Idempotency::Idempotent));
    }

    #[test]
    fn test_retry_after_hint() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(TrackerError::Rejected("x".to_string()).retry_after(), None);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(status_error(StatusCode::NOT_FOUND, None).is_not_found());
        assert!(!status_error(StatusCode::CONFLICT, None).is_not_found());
    }

    #[test]
    fn test_display() {
        let err = status_error(StatusCode::CONFLICT, None);
        assert_eq!(err.to_string(), "get_issue failed with status 409 Conflict: boom");
    }
}
