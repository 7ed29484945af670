//! Validation of the start URL: scheme, host allowlist and listing flavor.
//!
//! Everything here runs before the first request, so a bad argument is
//! reported without touching the network.

use thiserror::Error;
use url::Url;

use crate::listing::{ListingSource, SourceKind, build_source, percent_decode};
use crate::remote_path::{InvalidRemotePath, RemotePath};

/// Hosts accepted without `--allow-unknown-source`.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["5ur3kg.gq", "vc.5ur3kg.gq"];

/// Reasons a start URL is refused.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The argument has no `//`, so it is most likely a bare host or path.
    #[error("{input} does not look like a URL. Is it missing https://?")]
    MissingScheme {
        /// The argument as given.
        input: String,
    },

    /// The argument could not be parsed as a URL.
    #[error("invalid URL {input}: {source}")]
    InvalidUrl {
        /// The argument as given.
        input: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The URL's host is not on the allowlist.
    #[error(
        "this tool expects URLs from {expected}, not {host} \
         (use --allow-unknown-source or --allow-host to continue anyway)"
    )]
    HostNotAllowed {
        /// Host of the rejected URL.
        host: String,
        /// Comma-separated allowlist.
        expected: String,
    },

    /// A directory-index URL without a `?dir=` parameter.
    #[error("could not find a \"?dir=\" part in {url}. Is this a directory?")]
    MissingDirParameter {
        /// The URL as given.
        url: String,
    },

    /// The start path climbs out of the listing root.
    #[error(transparent)]
    InvalidPath(#[from] InvalidRemotePath),
}

/// Which hosts a start URL may point at.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    allowed: Vec<String>,
    allow_unknown: bool,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOWED_HOSTS
                .iter()
                .map(|host| canonical_host(host))
                .collect(),
            allow_unknown: false,
        }
    }
}

impl HostPolicy {
    /// Adds hosts to the allowlist.
    #[must_use]
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed
            .extend(hosts.into_iter().map(|host| canonical_host(host.as_ref())));
        self
    }

    /// Accepts any host when `allow` is true.
    #[must_use]
    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    /// Whether `host` passes the policy.
    #[must_use]
    pub fn is_allowed(&self, host: &str) -> bool {
        if self.allow_unknown {
            return true;
        }
        let host = canonical_host(host);
        self.allowed.iter().any(|allowed| *allowed == host)
    }

    fn check(&self, url: &Url) -> Result<(), TargetError> {
        let host = url.host_str().unwrap_or_default();
        if self.is_allowed(host) {
            Ok(())
        } else {
            Err(TargetError::HostNotAllowed {
                host: host.to_string(),
                expected: self.allowed.join(", "),
            })
        }
    }
}

/// Normalizes a host: trims, strips a leading `www.` and a trailing `.`, lowercases.
fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// A validated start URL and the remote folder it designates.
#[derive(Debug, Clone)]
pub struct StartTarget {
    url: Url,
    kind: SourceKind,
    root: RemotePath,
}

impl StartTarget {
    /// Validates `input` and derives the root remote path.
    ///
    /// `kind` forces a listing flavor; `None` detects it from the URL.
    ///
    /// # Errors
    ///
    /// Returns a [`TargetError`] describing the first check that failed.
    pub fn parse(
        input: &str,
        kind: Option<SourceKind>,
        hosts: &HostPolicy,
    ) -> Result<Self, TargetError> {
        if !input.contains("//") {
            return Err(TargetError::MissingScheme {
                input: input.to_string(),
            });
        }
        let url = Url::parse(input).map_err(|source| TargetError::InvalidUrl {
            input: input.to_string(),
            source,
        })?;
        hosts.check(&url)?;

        let kind = kind.unwrap_or_else(|| SourceKind::detect(&url));
        let root = match kind {
            SourceKind::Html => {
                let dir = url
                    .query_pairs()
                    .find(|(key, _)| key == "dir")
                    .map(|(_, value)| value.into_owned())
                    .ok_or_else(|| TargetError::MissingDirParameter {
                        url: input.to_string(),
                    })?;
                RemotePath::parse(&dir)?
            }
            SourceKind::Api => RemotePath::parse(&percent_decode(url.path()))?,
        };

        Ok(Self { url, kind, root })
    }

    /// The parsed start URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The listing flavor in use.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The remote folder the walk starts at.
    #[must_use]
    pub fn root(&self) -> &RemotePath {
        &self.root
    }

    /// Builds the listing source addressing this target's host.
    #[must_use]
    pub fn listing_source(&self) -> Box<dyn ListingSource> {
        build_source(self.kind, &self.url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<StartTarget, TargetError> {
        StartTarget::parse(input, None, &HostPolicy::default())
    }

    #[test]
    fn test_html_target_decodes_dir_parameter() {
        let target =
            parse("https://5ur3kg.gq/?dir=public/Betm/15007%20%E5%AE%BFX%E8%99%8E").unwrap();
        assert_eq!(target.kind(), SourceKind::Html);
        assert_eq!(target.root().as_str(), "public/Betm/15007 宿X虎");
    }

    #[test]
    fn test_api_target_uses_decoded_path() {
        let target = parse("https://vc.5ur3kg.gq/Betm/15007%20%E5%AE%BFX/").unwrap();
        assert_eq!(target.kind(), SourceKind::Api);
        assert_eq!(target.root().as_str(), "Betm/15007 宿X");
        assert_eq!(target.listing_source().kind(), SourceKind::Api);
    }

    #[test]
    fn test_target_without_scheme_is_rejected() {
        let err = parse("5ur3kg.gq/?dir=public").unwrap_err();
        assert!(matches!(err, TargetError::MissingScheme { .. }));
        assert!(err.to_string().contains("https://"));
    }

    #[test]
    fn test_target_with_unknown_host_is_rejected() {
        let err = parse("https://mirror.5ur3kg.gq/?dir=public").unwrap_err();
        assert!(matches!(err, TargetError::HostNotAllowed { ref host, .. } if host == "mirror.5ur3kg.gq"));
    }

    #[test]
    fn test_host_policy_extensions() {
        let policy = HostPolicy::default().with_hosts(["Mirror.Example."]);
        assert!(policy.is_allowed("mirror.example"));
        assert!(policy.is_allowed("www.5ur3kg.gq"));
        assert!(!policy.is_allowed("adf.rocks"));
        assert!(HostPolicy::default().allow_unknown(true).is_allowed("adf.rocks"));
    }

    #[test]
    fn test_forced_html_without_dir_is_rejected() {
        let err = StartTarget::parse(
            "https://5ur3kg.gq/public",
            Some(SourceKind::Html),
            &HostPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TargetError::MissingDirParameter { .. }));
    }

    #[test]
    fn test_target_rejects_traversal() {
        let err = parse("https://5ur3kg.gq/?dir=public/../private").unwrap_err();
        assert!(matches!(err, TargetError::InvalidPath(_)));
    }
}
