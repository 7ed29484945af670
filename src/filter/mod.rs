//! Path filtering for the mirror walk.
//!
//! A [`FilterConfig`] decides whether a child entry is followed (folders) or
//! downloaded (files). The subject is always the child's full remote path,
//! never just its name, so a pattern can select whole subtrees.
//!
//! - no pattern: everything matches
//! - pattern only: matches when the pattern is found anywhere in the path
//! - pattern and condition: the [`Condition`] decides, with the match bound
//!
//! # Example
//!
//! ```
//! use mirrordl_core::filter::FilterConfig;
//!
//! let filter = FilterConfig::new(Some(r"\.mp3$"), None).unwrap();
//! assert!(filter.matches("a/b/song.mp3"));
//! assert!(!filter.matches("a/b/song.flac"));
//! ```

mod condition;

pub use condition::{CompareOp, Condition, GroupRef};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while building a filter from user input.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The path pattern is not a valid regular expression.
    #[error("invalid --regex pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The condition expression does not parse.
    #[error("invalid --condition '{condition}' at offset {offset}: {reason}")]
    InvalidCondition {
        /// The rejected expression.
        condition: String,
        /// Byte offset of the problem.
        offset: usize,
        /// What went wrong.
        reason: String,
    },

    /// The condition reads a capture group the pattern does not define.
    #[error("--condition refers to capture group '{group}' which --regex does not define")]
    UnknownGroup {
        /// Index or name of the missing group.
        group: String,
    },
}

/// Immutable filter settings shared by the whole walk.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pattern: Option<Regex>,
    condition: Option<Condition>,
}

impl FilterConfig {
    /// A filter that accepts every path.
    #[must_use]
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Compiles the pattern and parses the condition once for the whole run.
    ///
    /// A condition without a pattern has nothing to inspect and is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the pattern or condition is invalid, or
    /// when the condition reads a group the pattern lacks.
    pub fn new(pattern: Option<&str>, condition: Option<&str>) -> Result<Self, FilterError> {
        let Some(pattern) = pattern else {
            if condition.is_some() {
                warn!("--condition has no effect without --regex; ignoring it");
            }
            return Ok(Self::accept_all());
        };

        let compiled = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let condition = condition.map(Condition::parse).transpose()?;
        if let Some(condition) = &condition {
            condition.check_groups(&compiled)?;
        }

        Ok(Self {
            pattern: Some(compiled),
            condition,
        })
    }

    /// Whether any filtering is configured.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    /// Decides whether `path` should be traversed or downloaded.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let Some(pattern) = &self.pattern else {
            return true;
        };

        let verdict = match &self.condition {
            None => pattern.is_match(path),
            Some(condition) => condition.evaluate(pattern.captures(path).as_ref()),
        };
        debug!(path, verdict, "filter evaluated");
        verdict
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_without_pattern_matches_everything() {
        let filter = FilterConfig::accept_all();
        assert!(!filter.is_active());
        for path in ["", "a", "a/b/song.flac", "../etc"] {
            assert!(filter.matches(path), "{path} should match");
        }
    }

    #[test]
    fn test_filter_condition_without_pattern_is_ignored() {
        let filter = FilterConfig::new(None, Some("false")).unwrap();
        assert!(filter.matches("anything"));
    }

    #[test]
    fn test_filter_pattern_matches_anywhere() {
        let filter = FilterConfig::new(Some(r"\.mp3$"), None).unwrap();
        assert!(filter.matches("a/b/song.mp3"));
        assert!(!filter.matches("a/b/song.flac"));

        let filter = FilterConfig::new(Some("Live"), None).unwrap();
        assert!(filter.matches("Artist/2019 Live Tour/01.mp3"));
    }

    #[test]
    fn test_filter_condition_decides_with_match_bound() {
        let filter = FilterConfig::new(Some(r"\.mp3$"), Some("not match")).unwrap();
        assert!(!filter.matches("a/b/song.mp3"));
        assert!(filter.matches("a/b/song.flac"));
    }

    #[test]
    fn test_filter_condition_on_group_text() {
        let filter =
            FilterConfig::new(Some(r"^[^/]+/([^/]+)"), Some("match.group(1) != 'Bonus'")).unwrap();
        assert!(filter.matches("Artist/Album/01.mp3"));
        assert!(!filter.matches("Artist/Bonus/01.mp3"));
    }

    #[test]
    fn test_filter_invalid_pattern_is_rejected() {
        let err = FilterConfig::new(Some("(unclosed"), None).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_filter_invalid_condition_is_rejected() {
        let err = FilterConfig::new(Some("a"), Some("match and")).unwrap_err();
        assert!(matches!(err, FilterError::InvalidCondition { .. }));
    }

    #[test]
    fn test_filter_condition_with_unknown_group_is_rejected() {
        let err = FilterConfig::new(Some("a"), Some("match.group(1) == 'x'")).unwrap_err();
        assert!(matches!(err, FilterError::UnknownGroup { .. }), "{err}");
    }
}
