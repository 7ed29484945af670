//! The mirror walk: listing, filtering and downloading a remote subtree.

mod engine;

pub use engine::{FailedFile, MirrorEngine, MirrorError, MirrorStats};
