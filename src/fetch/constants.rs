//! Constants for the fetch module (timeouts, retry schedule).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large media files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Attempts made for every request before giving up (initial attempt included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff unit: the delay before attempt `k` is `(2^k - 1)` units.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Suffix of the temporary file a download streams into before it is renamed.
pub const PARTIAL_SUFFIX: &str = ".part";
