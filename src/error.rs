//! Error types for service-directory.

use http::StatusCode;

use crate::registration::ServiceName;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed registration, rejected before touching the directory.
    #[error("invalid registration: {0}")]
    Validation(String),

    /// A registration with the same service URL is already live.
    #[error("service at url {0} is already registered")]
    Duplicate(String),

    /// No live registration matches the given service URL.
    #[error("service at url {0} not found")]
    NotFound(String),

    /// The provider cache holds no URL for the requested service.
    #[error("no providers available for service {0}")]
    NoProviders(ServiceName),

    /// A patch could not be pushed to a dependent.
    #[error("failed to deliver patch to {url}: {reason}")]
    Delivery {
        /// Update callback URL of the dependent.
        url: String,
        /// Transport error or unexpected status.
        reason: String,
    },

    /// The directory answered with a non-OK status.
    #[error("failed to {operation} service, directory responded with code {status}")]
    Rejected {
        /// `register` or `deregister`.
        operation: &'static str,
        /// Status returned by the directory.
        status: StatusCode,
    },

    /// Outbound request did not complete in time.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    /// HTTP request construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// URI parse error.
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a delivery error.
    pub fn delivery<U: Into<String>, R: ToString>(url: U, reason: R) -> Self {
        Self::Delivery {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for unknown URLs on removal and empty lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NoProviders(_))
    }

    /// True for registrations rejected synchronously.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert!(Error::NotFound("http://a".into()).is_not_found());
        assert!(Error::NoProviders(ServiceName::from("LogService")).is_not_found());
        assert!(Error::validation("empty name").is_validation());
        assert!(Error::Duplicate("http://a".into()).is_validation());
        assert!(!Error::delivery("http://a/services", "refused").is_not_found());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = Error::NoProviders(ServiceName::from("LogService"));
        assert_eq!(err.to_string(), "no providers available for service LogService");

        let err = Error::Rejected {
            operation: "register",
            status: StatusCode::BAD_REQUEST,
        };
        assert!(err.to_string().contains("400"));
    }
}
