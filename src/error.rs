//! # error
//!
//! Centralised error type for every collaborator call in the pipeline.
//!
//! Variants map onto the retry classes in [`ErrorClass`]: the retry policy
//! only ever asks an error *how long to wait*, never whether to give up.
//! Missing regex matches and unknown symbols are **not** errors; they surface
//! as empty fields and skip lists respectively.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection refused, DNS, timeout, reset — anything below HTTP.
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429 or an explicit quota message from the remote API.
    #[error("Rate limited (429): {0}")]
    RateLimited(String),

    /// Any other non-2xx response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Live sheet headers do not match the configured column layout.
    #[error("Column validation failed: {0}")]
    Validation(String),

    /// Response body was not the JSON shape we expected.
    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(429) {
            SyncError::RateLimited(e.to_string())
        } else if let Some(status) = e.status() {
            SyncError::Http { status: status.as_u16(), body: e.to_string() }
        } else if e.is_decode() {
            SyncError::Parse(e.to_string())
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

impl SyncError {
    /// Build the right variant for a non-2xx status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            SyncError::RateLimited(body)
        } else {
            SyncError::Http { status, body }
        }
    }

    /// Which backoff schedule applies to this failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::RateLimited(_) => ErrorClass::RateLimit,
            SyncError::Http { status: 429, .. } => ErrorClass::RateLimit,
            SyncError::Network(_) => ErrorClass::Transient,
            SyncError::Http { status, .. } if *status >= 500 || *status == 408 => {
                // a quota message still wins over the status
                match ErrorClass::from_message(&self.to_string()) {
                    ErrorClass::RateLimit => ErrorClass::RateLimit,
                    _ => ErrorClass::Transient,
                }
            }
            other => ErrorClass::from_message(&other.to_string()),
        }
    }
}

// ─── ErrorClass ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    Transient,
    Other,
}

impl ErrorClass {
    /// Classify a failure purely by its message text. Spreadsheet APIs report
    /// quota problems inside otherwise generic error bodies.
    pub fn from_message(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
            ErrorClass::RateLimit
        } else if lower.contains("network") || lower.contains("timeout") || lower.contains("connection") {
            ErrorClass::Transient
        } else {
            ErrorClass::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_429_is_rate_limit() {
        assert_eq!(SyncError::from_status(429, "slow down").class(), ErrorClass::RateLimit);
        assert_eq!(
            SyncError::Http { status: 429, body: String::new() }.class(),
            ErrorClass::RateLimit
        );
    }

    #[test]
    fn test_network_is_transient() {
        assert_eq!(SyncError::Network("reset by peer".into()).class(), ErrorClass::Transient);
    }

    #[test]
    fn test_quota_message_inside_http_error() {
        let err = SyncError::Http { status: 403, body: "Quota exceeded for quota metric".into() };
        assert_eq!(err.class(), ErrorClass::RateLimit);
    }

    #[test]
    fn test_server_errors_and_timeouts_are_transient() {
        assert_eq!(
            SyncError::from_status(503, "The service is currently unavailable").class(),
            ErrorClass::Transient
        );
        assert_eq!(SyncError::from_status(500, "Internal error").class(), ErrorClass::Transient);
        assert_eq!(SyncError::from_status(408, "Request Timeout").class(), ErrorClass::Transient);
        assert_eq!(
            SyncError::from_status(503, "Quota exceeded for quota metric").class(),
            ErrorClass::RateLimit
        );
    }

    #[test]
    fn test_plain_http_error_is_other() {
        let err = SyncError::Http { status: 400, body: "Unable to parse range".into() };
        assert_eq!(err.class(), ErrorClass::Other);
    }

    #[test]
    fn test_timeout_in_message_is_transient() {
        assert_eq!(ErrorClass::from_message("request Timeout after 15s"), ErrorClass::Transient);
    }
}
