//! Listing sources: turning one remote folder response into files and subfolders.
//!
//! # Architecture
//!
//! - [`ListingSource`] - Async trait every listing flavor implements
//! - [`HtmlIndexSource`] - Server-rendered directory-index pages (`?dir=` links)
//! - [`ApiSource`] - JSON folder-listing API (`/api?path=/...`)
//! - [`Listing`] - The flat view a source produces for one folder
//!
//! Sources are pure translators: they know how to address a folder and how to
//! read the answer. Fetching and retrying belong to [`Fetcher`]; deciding what
//! to do with the entries belongs to the mirror engine.

mod api;
mod error;
mod html;

pub use api::ApiSource;
pub use error::ListingError;
pub use html::{HtmlIndexSource, is_subfolder_link};

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::fetch::{FetchRequest, Fetcher};
use crate::remote_path::RemotePath;

/// Which listing flavor a start URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Directory-index HTML pages.
    Html,
    /// JSON folder-listing API.
    Api,
}

impl SourceKind {
    /// Picks the flavor from the URL shape: a `dir` query parameter means an
    /// index page, anything else the API.
    #[must_use]
    pub fn detect(url: &Url) -> Self {
        if url.query_pairs().any(|(key, _)| key == "dir") {
            Self::Html
        } else {
            Self::Api
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Api => f.write_str("api"),
        }
    }
}

/// A file discovered in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Decoded file name (not yet sanitized).
    pub name: String,
    /// Absolute URL of the content.
    pub url: String,
}

impl FileEntry {
    /// Creates a file entry.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// The immediate children of one remote folder, in listing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Where this folder's files belong, as reported by the listing itself.
    pub canonical_path: RemotePath,
    /// Files, in the order the listing presented them.
    pub files: Vec<FileEntry>,
    /// Subfolder paths relative to `canonical_path`, in listing order.
    pub subfolders: Vec<String>,
}

impl Listing {
    /// An empty listing for `canonical_path`.
    #[must_use]
    pub fn empty(canonical_path: RemotePath) -> Self {
        Self {
            canonical_path,
            files: Vec::new(),
            subfolders: Vec::new(),
        }
    }
}

/// One listing flavor.
///
/// Implementations translate between remote paths and requests, and between
/// raw response bodies and [`Listing`]s.
#[async_trait]
pub trait ListingSource: Send + Sync + fmt::Debug {
    /// Which flavor this is.
    fn kind(&self) -> SourceKind;

    /// URL that lists `path`.
    fn listing_url(&self, path: &RemotePath) -> String;

    /// `Accept` header for listing requests.
    fn accept(&self) -> &'static str;

    /// Whether a 404 for a listing is final rather than transient.
    fn not_found_is_fatal(&self) -> bool {
        false
    }

    /// Extracts the listing from a raw response body.
    ///
    /// # Errors
    ///
    /// Returns a [`ListingError`] rejection when the body lacks the
    /// structure this flavor relies on.
    fn normalize(
        &self,
        body: &str,
        requested: &RemotePath,
        page_url: &str,
    ) -> Result<Listing, ListingError>;

    /// Fetches and normalizes the listing of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ListingError::Fetch`] when the request fails for good, or
    /// the rejection produced by [`normalize`](Self::normalize).
    async fn fetch_listing(
        &self,
        fetcher: &Fetcher,
        path: &RemotePath,
    ) -> Result<Listing, ListingError> {
        let url = self.listing_url(path);
        info!(path = %path, url = %url, "Getting listing");

        let request = FetchRequest::new(url.clone(), self.accept())
            .fatal_not_found(self.not_found_is_fatal());
        let body = fetcher
            .get_text(&request)
            .await
            .map_err(|source| ListingError::fetch(path, source))?;

        let listing = self.normalize(&body, path, &url)?;
        debug!(
            path = %listing.canonical_path,
            files = listing.files.len(),
            subfolders = listing.subfolders.len(),
            "listing normalized"
        );
        Ok(listing)
    }
}

/// Builds the listing source for `kind`, addressed relative to `start_url`.
#[must_use]
pub fn build_source(kind: SourceKind, start_url: &Url) -> Box<dyn ListingSource> {
    match kind {
        SourceKind::Html => Box::new(HtmlIndexSource::new(start_url.clone())),
        SourceKind::Api => Box::new(ApiSource::new(start_url)),
    }
}

/// Percent-decodes a URL fragment, replacing invalid UTF-8.
pub(crate) fn percent_decode(value: &str) -> String {
    urlencoding::decode(value).map_or_else(
        |_| String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned(),
        std::borrow::Cow::into_owned,
    )
}
