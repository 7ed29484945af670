//! Error types for listing retrieval and normalization.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::remote_path::InvalidRemotePath;

/// Errors that end the walk of a folder.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The listing request itself failed (retries exhausted, fatal 404, ...).
    #[error("can't list {path}: {source}")]
    Fetch {
        /// Remote path being listed.
        path: String,
        /// The fetch failure.
        #[source]
        source: FetchError,
    },

    /// A directory-index page without a breadcrumb pointing at itself.
    #[error("directory index {url} has no self-referencing breadcrumb in its header")]
    MissingSelfReference {
        /// Page URL.
        url: String,
    },

    /// The API answered with something that is not a folder.
    #[error("not a folder: {path}")]
    NotAFolder {
        /// Remote path being listed.
        path: String,
    },

    /// The API answered with a body that is not valid JSON for a listing.
    #[error("invalid listing JSON for {path}: {source}")]
    InvalidJson {
        /// Remote path being listed.
        path: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The listing's self-reference is not a usable remote path.
    #[error(transparent)]
    InvalidPath(#[from] InvalidRemotePath),
}

impl ListingError {
    /// Creates a fetch failure for `path`.
    pub fn fetch(path: impl ToString, source: FetchError) -> Self {
        Self::Fetch {
            path: path.to_string(),
            source,
        }
    }

    /// Whether the server answered but the answer could not be used as a listing.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Fetch { .. })
    }
}
