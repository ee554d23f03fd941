//! Error types for http-job
//!
//! Every failure an attempt can hit is an [`Error`] variant. Callers mostly care about
//! two things:
//! - which [`ErrorKind`] it is (for logging and alert subjects)
//! - whether it is transient, i.e. worth handing back to the host scheduler for another attempt

use thiserror::Error;

/// Result type alias for http-job operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for http-job
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "proxy")
        key: Option<String>,
    },

    /// The job description cannot be turned into a request (bad URL, method or header)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request did not complete within the job's timeout
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout {
        /// The timeout that was exceeded, in milliseconds
        timeout_ms: u64,
        /// The request URL
        url: String,
    },

    /// Connection, protocol or body read failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Mail dispatch failed
    #[error("notification error: {0}")]
    Notification(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad proxy or other static setting; fatal
    Configuration,
    /// Malformed URL, method or header value; fatal
    InvalidRequest,
    /// Deadline exceeded; transient
    Timeout,
    /// Connection or read failure; transient
    Network,
    /// Mail transport failure; never changes a job outcome
    Notification,
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Configuration,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Timeout { .. } => ErrorKind::Timeout,
            // reqwest reports its own deadline as a network error
            Error::Network(e) if e.is_timeout() => ErrorKind::Timeout,
            Error::Network(e) if e.is_builder() => ErrorKind::InvalidRequest,
            Error::Network(_) => ErrorKind::Network,
            Error::Notification(_) => ErrorKind::Notification,
        }
    }

    /// Returns true if another attempt may succeed
    ///
    /// Only timeouts and network failures qualify. Configuration and request
    /// errors will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Network)
    }

    /// Messages of this error and all of its sources, outermost first
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}
