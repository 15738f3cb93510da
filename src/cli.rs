use clap::{Args, Parser};
use serde::Serialize;
use std::path::PathBuf;

/// List a photo album tree, or copy it into another storage.
#[derive(Debug, Parser)]
#[command(name = "album-rsync", version, about, long_about = None)]
pub struct Cli {
    /// Directory to read albums from.
    pub src: PathBuf,
    /// Directory to copy albums into. Without it the source is listed.
    pub dest: Option<PathBuf>,
    /// Read settings from this file instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Print the source tree even when a destination is given.
    #[arg(long)]
    pub list_only: bool,
    #[command(flatten)]
    pub overrides: Overrides,
}

impl Cli {
    /// The destination to sync into, unless this run only lists.
    pub fn sync_target(&self) -> Option<&PathBuf> {
        self.dest.as_ref().filter(|_| !self.list_only)
    }
}

/// Settings that, when given on the command line, win over every other
/// configuration source. Unset flags are not serialized at all.
#[derive(Debug, Default, Args, Serialize)]
pub struct Overrides {
    /// Only files whose names match this regex (case-insensitive).
    #[arg(long, value_name = "REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    /// Skip files whose names match this regex.
    #[arg(long, value_name = "REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    /// Only folders whose names match this regex.
    #[arg(long, value_name = "REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_dir: Option<String>,
    /// Skip folders whose names match this regex.
    #[arg(long, value_name = "REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_dir: Option<String>,
    /// Include files stored directly in the root.
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub root_files: bool,
    /// Only process files stored directly in the root.
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub root_only: bool,
    /// List folders without their files.
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub list_folders: bool,
    /// Sort folders and files by name.
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    pub list_sort: bool,
    /// Report what would be copied without copying.
    #[arg(short = 'n', long)]
    #[serde(skip_serializing_if = "is_false")]
    pub dry_run: bool,
    #[arg(short, long)]
    #[serde(skip_serializing_if = "is_false")]
    pub verbose: bool,
    /// Minimum seconds between remote API calls.
    #[arg(long, value_name = "SECONDS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttling: Option<f64>,
    /// Retries for a failed remote API call.
    #[arg(long, value_name = "COUNT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Seconds before the first retry.
    #[arg(long, value_name = "SECONDS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<f64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
