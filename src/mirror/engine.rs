//! Depth-first mirror walk over a listing source.
//!
//! # Overview
//!
//! For every folder, the engine:
//!
//! 1. fetches and normalizes its listing (a failure aborts the walk)
//! 2. creates the matching local directory
//! 3. downloads each file that passes the filter and is not on disk yet, in
//!    listing order (a failed file is recorded and the walk moves on)
//! 4. schedules each subfolder that passes the filter, in listing order
//!
//! Folders are kept on an explicit stack instead of the call stack. Subfolders
//! are pushed in reverse so they pop in listing order, which yields the same
//! pre-order a recursive walk would: a folder's files, then its first
//! subfolder's whole subtree, then the next subfolder.
//!
//! # Example
//!
//! ```no_run
//! use mirrordl_core::fetch::{Fetcher, RetryPolicy};
//! use mirrordl_core::filter::FilterConfig;
//! use mirrordl_core::listing::{SourceKind, build_source};
//! use mirrordl_core::mirror::MirrorEngine;
//! use mirrordl_core::remote_path::RemotePath;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let start = Url::parse("https://mirror.example/?dir=public/Artist")?;
//! let engine = MirrorEngine::new(
//!     Fetcher::new(RetryPolicy::default())?,
//!     build_source(SourceKind::Html, &start),
//!     FilterConfig::accept_all(),
//!     ".",
//! );
//! let stats = engine.run(&RemotePath::parse("public/Artist")?).await?;
//! println!("downloaded {}, skipped {}", stats.downloaded(), stats.skipped());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::fetch::Fetcher;
use crate::filter::FilterConfig;
use crate::listing::{FileEntry, Listing, ListingError, ListingSource};
use crate::local_path::{ensure_directory_chain, sanitize_dir_path, sanitize_file_name};
use crate::remote_path::RemotePath;

/// Error that ends a mirror walk.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// A folder listing could not be fetched or understood.
    #[error(transparent)]
    Listing(#[from] ListingError),

    /// The local directory for a folder could not be created.
    #[error("can't create directory {path}: {source}")]
    CreateDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// A file download that was given up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    /// Content URL.
    pub url: String,
    /// Local target the file was meant for.
    pub target: PathBuf,
    /// Why it failed.
    pub reason: String,
}

/// Counters from one completed walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorStats {
    folders: usize,
    downloaded: usize,
    skipped: usize,
    filtered: usize,
    bytes: u64,
    failed: Vec<FailedFile>,
}

impl MirrorStats {
    /// Number of folders listed.
    #[must_use]
    pub fn folders(&self) -> usize {
        self.folders
    }

    /// Number of files downloaded in this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    /// Number of files already present locally.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of files and folders excluded by the filter.
    #[must_use]
    pub fn filtered(&self) -> usize {
        self.filtered
    }

    /// Bytes written by this run.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Files abandoned after exhausting their retries.
    #[must_use]
    pub fn failed(&self) -> &[FailedFile] {
        &self.failed
    }

    /// Whether every file that passed the filter is now on disk.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates listing, filtering and downloading for one mirror run.
#[derive(Debug)]
pub struct MirrorEngine {
    fetcher: Fetcher,
    source: Box<dyn ListingSource>,
    filter: FilterConfig,
    output_root: PathBuf,
}

impl MirrorEngine {
    /// Creates an engine writing the mirror below `output_root`.
    #[must_use]
    pub fn new(
        fetcher: Fetcher,
        source: Box<dyn ListingSource>,
        filter: FilterConfig,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            source,
            filter,
            output_root: output_root.into(),
        }
    }

    /// Returns the directory the mirror is written to.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Mirrors the subtree rooted at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Listing`] when any folder listing fails; the
    /// walk stops there and files written so far stay on disk. Returns
    /// [`MirrorError::CreateDir`] when a local directory cannot be created.
    /// Individual file failures are not errors; see [`MirrorStats::failed`].
    #[instrument(skip(self, start), fields(source = %self.source.kind(), start = %start))]
    pub async fn run(&self, start: &RemotePath) -> Result<MirrorStats, MirrorError> {
        let mut stats = MirrorStats::default();
        let mut pending = vec![start.clone()];

        while let Some(path) = pending.pop() {
            info!(path = %path, "Processing folder");
            let listing = self.source.fetch_listing(&self.fetcher, &path).await?;

            if path != *start && !listing.canonical_path.starts_with(&path) {
                warn!(
                    requested = %path,
                    canonical = %listing.canonical_path,
                    "listing points outside the requested folder; not descending"
                );
                continue;
            }
            stats.folders += 1;

            let children = self.mirror_folder(listing, &mut stats).await?;
            pending.extend(children.into_iter().rev());
        }

        info!(
            folders = stats.folders,
            downloaded = stats.downloaded,
            skipped = stats.skipped,
            filtered = stats.filtered,
            failed = stats.failed.len(),
            "Mirror walk finished"
        );
        Ok(stats)
    }

    /// Downloads one folder's files and returns the subfolders to visit next.
    async fn mirror_folder(
        &self,
        listing: Listing,
        stats: &mut MirrorStats,
    ) -> Result<Vec<RemotePath>, MirrorError> {
        let Listing {
            canonical_path,
            files,
            subfolders,
        } = listing;

        let relative_dir = sanitize_dir_path(canonical_path.as_str());
        let local_dir = ensure_directory_chain(&self.output_root, &relative_dir)
            .await
            .map_err(|source| MirrorError::CreateDir {
                path: self.output_root.join(&relative_dir),
                source,
            })?;

        for file in files {
            let subject = child_subject(&canonical_path, &file.name);
            if !self.filter.matches(&subject) {
                debug!(path = %subject, "file excluded by filter");
                stats.filtered += 1;
                continue;
            }
            self.mirror_file(&local_dir, &file, stats).await;
        }

        let mut children = Vec::with_capacity(subfolders.len());
        for name in subfolders {
            let child = match canonical_path.join(&name) {
                Ok(child) if child != canonical_path => child,
                Ok(_) => continue,
                Err(error) => {
                    warn!(folder = %canonical_path, name = %name, error = %error, "skipping subfolder");
                    continue;
                }
            };
            if !self.filter.matches(child.as_str()) {
                debug!(path = %child, "folder excluded by filter");
                stats.filtered += 1;
                continue;
            }
            children.push(child);
        }

        Ok(children)
    }

    /// Downloads one file unless it is already present. Never fails the walk.
    async fn mirror_file(&self, local_dir: &Path, file: &FileEntry, stats: &mut MirrorStats) {
        let name = sanitize_file_name(&file.name);
        let target = local_dir.join(&name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            info!(file = %name, "Skipped");
            stats.skipped += 1;
            return;
        }

        info!(file = %name, url = %file.url, "Downloading");
        match self.fetcher.download_to_file(&file.url, &target).await {
            Ok(bytes) => {
                stats.downloaded += 1;
                stats.bytes += bytes;
            }
            Err(error) => {
                warn!(file = %name, url = %file.url, error = %error, "Can't download file; continuing");
                stats.failed.push(FailedFile {
                    url: file.url.clone(),
                    target,
                    reason: error.to_string(),
                });
            }
        }
    }
}

/// Full remote path of a child, used as the filter subject.
fn child_subject(parent: &RemotePath, name: &str) -> String {
    if parent.is_root() {
        name.to_string()
    } else {
        format!("{}/{name}", parent.as_str())
    }
}
