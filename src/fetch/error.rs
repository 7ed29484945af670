//! Error types for the fetch module.
//!
//! Every variant carries the URL or path it concerns so a failure can be
//! reported without extra context from the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a listing or a file.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, reset body stream, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A listing that does not exist (404 on a source where that is final).
    #[error("resource not found (404): {url}")]
    NotFound {
        /// The listing URL.
        url: String,
    },

    /// File system error while writing a download.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Every attempt allowed by the retry policy failed.
    #[error("can't get {url} after {attempts} attempts: {last}")]
    Exhausted {
        /// The URL that could not be fetched.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The error of the final attempt.
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a fatal not-found error.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Wraps the last attempt's error once the retry budget is spent.
    pub fn exhausted(url: impl Into<String>, attempts: u32, last: FetchError) -> Self {
        Self::Exhausted {
            url: url.into(),
            attempts,
            last: Box::new(last),
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Transport failures and error statuses are transient; local IO,
    /// malformed URLs and final verdicts are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => true,
            Self::NotFound { .. }
            | Self::Io { .. }
            | Self::InvalidUrl { .. }
            | Self::Exhausted { .. } => false,
        }
    }

    /// HTTP status of the failure, if it was an HTTP-level one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
