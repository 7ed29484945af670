//! Directory-index pages with `?dir=` navigation.
//!
//! The index renders a `<header>` whose breadcrumb links each carry a
//! `?dir=<path>` parameter; the last breadcrumb is the page itself. Below the
//! header, file links point straight at content and folder links point at
//! `?dir=<path>/<child>`. Only folder links that extend the page's own
//! breadcrumb are followed, which keeps the walk from climbing back up through
//! `..`, parent or sibling links.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use super::{FileEntry, Listing, ListingError, ListingSource, SourceKind, percent_decode};
use crate::remote_path::RemotePath;

/// `Accept` header for index pages.
const ACCEPT_HTML: &str = "text/html, */*";

/// Query parameter carrying the folder path.
const DIR_PARAM: &str = "dir";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<header\b[^>]*>.*?</header\s*>"));
static FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<footer\b[^>]*>.*?</footer\s*>"));
static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
    )
});

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Listing source for `?dir=` directory-index pages.
#[derive(Debug, Clone)]
pub struct HtmlIndexSource {
    start_url: Url,
}

impl HtmlIndexSource {
    /// Creates a source addressing folders relative to `start_url`.
    ///
    /// Folder URLs are built by replacing the `dir` parameter of `start_url`.
    #[must_use]
    pub fn new(start_url: Url) -> Self {
        Self { start_url }
    }
}

#[async_trait]
impl ListingSource for HtmlIndexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Html
    }

    fn listing_url(&self, path: &RemotePath) -> String {
        let mut url = self.start_url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != DIR_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(DIR_PARAM, path.as_str());
        url.to_string()
    }

    fn accept(&self) -> &'static str {
        ACCEPT_HTML
    }

    fn normalize(
        &self,
        body: &str,
        requested: &RemotePath,
        page_url: &str,
    ) -> Result<Listing, ListingError> {
        let missing = || ListingError::MissingSelfReference {
            url: page_url.to_string(),
        };

        let header = HEADER_RE.find(body).ok_or_else(missing)?;
        let self_href = anchor_hrefs(header.as_str())
            .filter(|href| href.contains("?dir="))
            .last()
            .ok_or_else(missing)?;
        let canonical_path = dir_value(&self_href)
            .map(|raw| RemotePath::parse(&percent_decode(raw)))
            .transpose()?
            .ok_or_else(missing)?;
        if canonical_path != *requested {
            debug!(requested = %requested, canonical = %canonical_path, "listing reports a different path");
        }

        let base = Url::parse(page_url).ok();
        let without_header = HEADER_RE.replacen(body, 1, "");
        let content = FOOTER_RE.replacen(&without_header, 1, "");

        let mut listing = Listing::empty(canonical_path);
        let mut seen_files = HashSet::new();
        let mut seen_folders = HashSet::new();

        for href in anchor_hrefs(&content) {
            if is_ignorable_href(&href) {
                continue;
            }

            if !href.contains("?dir") {
                let Some(entry) = file_entry(&href, base.as_ref()) else {
                    debug!(href = %href, "skipping link without a file name");
                    continue;
                };
                if seen_files.insert(entry.url.clone()) {
                    listing.files.push(entry);
                }
                continue;
            }

            if !is_subfolder_link(&href, &self_href) {
                continue;
            }
            let Some(name) = subfolder_name(&href, &listing.canonical_path) else {
                warn!(href = %href, "ignoring folder link outside the current folder");
                continue;
            };
            if seen_folders.insert(name.clone()) {
                listing.subfolders.push(name);
            }
        }

        Ok(listing)
    }
}

/// Whether `href` is a folder link below the page whose breadcrumb is `self_href`.
///
/// Holds only when `href` extends `self_href` by a path separator, so every
/// accepted link starts with the page's own self-reference.
#[must_use]
pub fn is_subfolder_link(href: &str, self_href: &str) -> bool {
    let Some(rest) = href.strip_prefix(self_href) else {
        return false;
    };
    if self_href.ends_with('=') {
        // Root breadcrumb (`?dir=`): any non-empty path is below it.
        return !rest.is_empty();
    }
    rest.strip_prefix('/').is_some_and(|child| !child.is_empty())
}

/// Every `href` value of the anchors in `html`, entity-unescaped, in document order.
fn anchor_hrefs(html: &str) -> impl Iterator<Item = String> + '_ {
    ANCHOR_HREF_RE.captures_iter(html).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| html_unescape_basic(m.as_str().trim()))
    })
}

/// Raw (still percent-encoded) value of the `dir` parameter in `href`.
fn dir_value(href: &str) -> Option<&str> {
    let query = href.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("dir="))
}

fn is_ignorable_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
}

fn file_entry(href: &str, base: Option<&Url>) -> Option<FileEntry> {
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    let last = url.path_segments()?.next_back()?;
    let name = percent_decode(last);
    if name.is_empty() {
        return None;
    }
    Some(FileEntry::new(name, url.to_string()))
}

/// Child path of a folder link relative to `canonical`, or `None` when the
/// link does not resolve below it.
fn subfolder_name(href: &str, canonical: &RemotePath) -> Option<String> {
    let child = RemotePath::parse(&percent_decode(dir_value(href)?)).ok()?;
    if child == *canonical || !child.starts_with(canonical) {
        return None;
    }
    let name = if canonical.is_root() {
        child.as_str()
    } else {
        child
            .as_str()
            .strip_prefix(canonical.as_str())?
            .trim_start_matches('/')
    };
    Some(name.to_string())
}

fn html_unescape_basic(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
