//! Shared User-Agent and content negotiation headers for mirror traffic.
//!
//! Listing and file requests go through one client, so the identifying
//! headers live here in one place.

/// `Accept-Language` sent with every request.
pub(crate) const ACCEPT_LANGUAGE: &str = "en-us";

/// `Accept` value for file content requests.
pub(crate) const ACCEPT_ANY: &str = "*/*";

/// Default User-Agent for all mirror requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Mozilla/5.0 (mirrordl/{version})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("Mozilla/5.0 (mirrordl/")
                .and_then(|s| s.strip_suffix(')'))
                .expect("UA has version"),
            "UA must contain crate version: {ua}"
        );
    }
}
