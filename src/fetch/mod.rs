//! Resilient HTTP fetching for listings and file content.
//!
//! # Features
//!
//! - One retry policy for every request: up to 5 attempts, sleeping
//!   `2^k - 1` seconds before attempt `k` (0, 1, 3, 7, 15)
//! - Streaming downloads written to disk chunk by chunk
//! - A file only appears under its final name after the whole body arrived
//! - Opt-in fatal 404 for listing requests
//!
//! # Example
//!
//! ```no_run
//! use mirrordl_core::fetch::{Fetcher, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(RetryPolicy::default())?;
//! let bytes = fetcher
//!     .download_to_file("https://example.com/song.mp3", Path::new("./song.mp3"))
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod retry;

pub use client::{FetchRequest, Fetcher};
pub use constants::{DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS};
pub use error::FetchError;
pub use retry::RetryPolicy;
