//! Errors returned by the HTTP collaborators.

use thiserror::Error;

/// Failure talking to the discovery service or the position feed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("service not configured: {0}")]
    NotConfigured(&'static str),
}

impl ApiError {
    /// Whether the failure is likely to clear on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect(),
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode { .. } | ApiError::NotConfigured(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status() {
        let busy = ApiError::Status {
            url: "http://x".into(),
            status: 503,
        };
        let missing = ApiError::Status {
            url: "http://x".into(),
            status: 404,
        };
        assert!(busy.is_transient());
        assert!(!missing.is_transient());
        assert!(!ApiError::NotConfigured("positions").is_transient());
    }
}
