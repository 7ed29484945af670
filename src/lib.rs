//! Mirrordl Core Library
//!
//! This library mirrors a remote folder hierarchy, published either as
//! directory-index HTML pages or through a JSON folder-listing API, onto the
//! local filesystem. Already present files are skipped, so a rerun only
//! fetches what is missing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - HTTP GET with exponential backoff and streaming downloads
//! - [`listing`] - Listing sources that turn one folder response into files and subfolders
//! - [`filter`] - Regex and condition filter deciding what to follow
//! - [`local_path`] - Local path sanitization and directory creation
//! - [`mirror`] - The depth-first mirror walk
//! - [`remote_path`] - Validated remote folder paths
//! - [`target`] - Start URL validation and host allowlist

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
pub mod filter;
pub mod listing;
pub mod local_path;
pub mod mirror;
pub mod remote_path;
pub mod target;

pub(crate) mod user_agent;

// Re-export commonly used types
pub use fetch::{FetchError, Fetcher, RetryPolicy};
pub use filter::{FilterConfig, FilterError};
pub use listing::{ListingError, ListingSource, SourceKind};
pub use mirror::{MirrorEngine, MirrorError, MirrorStats};
pub use remote_path::RemotePath;
pub use target::{HostPolicy, StartTarget, TargetError};
