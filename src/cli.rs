//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use mirrordl_core::SourceKind;

/// Mirror a remote folder listing onto the local disk.
///
/// Mirrordl walks a remote folder tree, published as directory-index pages
/// (`https://host/?dir=path`) or through a folder API (`https://host/path`),
/// and downloads every file that is not already present locally.
#[derive(Parser, Debug)]
#[command(name = "mirrordl")]
#[command(author, version, about)]
pub struct Args {
    /// Start URL, e.g. "https://5ur3kg.gq/?dir=public/Artist"
    pub url: String,

    /// Only follow and download paths matching this regular expression
    #[arg(long, value_name = "PATTERN")]
    pub regex: Option<String>,

    /// Condition evaluated against the regex match, e.g. "match.group(1) != 'Live'"
    #[arg(long, value_name = "EXPR")]
    pub condition: Option<String>,

    /// Accept start URLs from any host
    #[arg(long)]
    pub allow_unknown_source: bool,

    /// Additional host to accept (repeatable)
    #[arg(long = "allow-host", value_name = "HOST")]
    pub allow_hosts: Vec<String>,

    /// Listing flavor of the start URL
    #[arg(long, value_enum, default_value_t = SourceArg::Auto)]
    pub source: SourceArg,

    /// Directory the mirror is written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--source` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Detect from the URL: a `dir` query parameter means html
    Auto,
    /// Directory-index pages
    Html,
    /// JSON folder API
    Api,
}

impl SourceArg {
    /// The forced listing flavor, or `None` for detection.
    pub fn kind(self) -> Option<SourceKind> {
        match self {
            Self::Auto => None,
            Self::Html => Some(SourceKind::Html),
            Self::Api => Some(SourceKind::Api),
        }
    }
}
