//! Mapping remote names onto safe local paths.
//!
//! Remote listings may carry any character in folder and file names. These
//! helpers replace the characters that common filesystems reject and make sure
//! a name can never introduce extra directory levels or climb out of the
//! output root.

use std::path::{Path, PathBuf};

/// Characters replaced with `_` in every path segment.
const ILLEGAL_CHARS: [char; 8] = ['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces filesystem-hostile characters in `raw` with `_`.
///
/// `/` is kept when `allow_slash` is true (directory paths, where it is a
/// separator) and replaced otherwise (file names). Control characters are
/// always replaced.
#[must_use]
pub fn sanitize_path_segment(raw: &str, allow_slash: bool) -> String {
    raw.chars()
        .map(|c| match c {
            '/' if !allow_slash => '_',
            c if ILLEGAL_CHARS.contains(&c) || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Sanitizes a file name so it is a single, safe path component.
///
/// Empty names become `_`; `.` and `..` have their dots rewritten.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    rewrite_dot_segment(sanitize_path_segment(name, false))
}

/// Turns a slash-delimited remote directory path into a relative local path.
///
/// Each segment is sanitized on its own; empty segments (leading, trailing or
/// doubled slashes) are dropped, so the result is always relative.
#[must_use]
pub fn sanitize_dir_path(path: &str) -> PathBuf {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| rewrite_dot_segment(sanitize_path_segment(segment, false)))
        .collect()
}

/// Creates `root/relative` and every missing ancestor.
///
/// Directories that already exist, including ones created concurrently by
/// someone else, are not an error.
///
/// # Errors
///
/// Returns the IO error if a component cannot be created (for example when a
/// regular file occupies the path).
pub async fn ensure_directory_chain(root: &Path, relative: &Path) -> std::io::Result<PathBuf> {
    let full = root.join(relative);
    tokio::fs::create_dir_all(&full).await?;
    Ok(full)
}

fn rewrite_dot_segment(segment: String) -> String {
    match segment.as_str() {
        "" => "_".to_string(),
        "." | ".." => segment.replace('.', "_"),
        _ => segment,
    }
}
