//! Remote paths relative to the listing endpoint.

use std::fmt;

use thiserror::Error;

/// Rejection of a path that would climb out of the mirrored subtree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote path '{path}' contains a '..' segment")]
pub struct InvalidRemotePath {
    /// The offending path as received.
    pub path: String,
}

/// A slash-delimited, already-decoded path of a remote folder or file.
///
/// Construction drops empty and `.` segments and rejects `..`, so a
/// `RemotePath` can only ever point at or below the root of the listing
/// endpoint. The empty path is the endpoint root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// The endpoint root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalizes and validates `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRemotePath`] when a segment is `..`.
    pub fn parse(raw: &str) -> Result<Self, InvalidRemotePath> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(InvalidRemotePath {
                        path: raw.to_string(),
                    });
                }
                segment => segments.push(segment),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Appends a relative child path (a name, or several segments).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRemotePath`] when `child` contains `..`.
    pub fn join(&self, child: &str) -> Result<Self, InvalidRemotePath> {
        let child = Self::parse(child)?;
        if self.is_root() {
            return Ok(child);
        }
        if child.is_root() {
            return Ok(self.clone());
        }
        Ok(Self(format!("{}/{}", self.0, child.0)))
    }

    /// Whether this is the endpoint root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` equals `ancestor` or lies below it.
    #[must_use]
    pub fn starts_with(&self, ancestor: &RemotePath) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || self
                .0
                .strip_prefix(ancestor.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// The path as a string without leading or trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
