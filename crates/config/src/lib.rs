//! Layered configuration for album-rsync.
//!
//! Settings are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a config file (`config.toml` or `config.yaml` in the platform config
//!    directory, or one named explicitly),
//! 3. `ALBUM_RSYNC_*` environment variables,
//! 4. overrides supplied by the caller (command-line flags).

pub mod error;

use crate::error::{ErrorKind, Result};
use album_rsync_library::{SyncOptions, WalkOptions};
use album_rsync_resilience::ResilienceConfig;
use album_rsync_storage::{Filter, NameFilters};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "ALBUM_RSYNC_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Only files whose names match this pattern.
    pub include: Option<String>,
    /// Skip files whose names match this pattern.
    pub exclude: Option<String>,
    /// Only folders whose names match this pattern.
    pub include_dir: Option<String>,
    /// Skip folders whose names match this pattern.
    pub exclude_dir: Option<String>,
    pub root_files: bool,
    pub root_only: bool,
    /// List folder names without their files.
    pub list_folders: bool,
    pub list_sort: bool,
    pub dry_run: bool,
    pub verbose: bool,
    /// Minimum seconds between two remote API calls.
    pub throttling: f64,
    /// Retries after the first failed attempt of a remote API call.
    pub retry: u32,
    /// Seconds to wait before the first retry; doubles on every retry.
    pub backoff: f64,
    /// Upper bound, in seconds, for a single retry delay.
    pub max_backoff: f64,
}

impl Default for Config {
    fn default() -> Self {
        let resilience = ResilienceConfig::default();
        Self {
            include: None,
            exclude: None,
            include_dir: None,
            exclude_dir: None,
            root_files: false,
            root_only: false,
            list_folders: false,
            list_sort: false,
            dry_run: false,
            verbose: false,
            throttling: resilience.throttle.as_secs_f64(),
            retry: resilience.retries,
            backoff: resilience.base_delay.as_secs_f64(),
            max_backoff: resilience.max_delay.as_secs_f64(),
        }
    }
}

impl Config {
    /// Directory searched for `config.toml` / `config.yaml` when no file is
    /// given explicitly.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "album-rsync").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Load and validate the configuration.
    ///
    /// `overrides` is serialized on top of every other source; fields it
    /// skips (e.g. `None` with `skip_serializing_if`) leave lower layers alone.
    /// An explicit `file` must exist.
    pub fn load(file: Option<&Path>, overrides: &impl Serialize) -> Result<Self> {
        let figment = Self::figment(file)?.merge(Serialized::globals(overrides));
        Self::from_figment(&figment)
    }

    /// Every layer except caller overrides.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Load);
                }
                tracing::debug!(path = %path.display(), "Loading config file");
                match path.extension().and_then(|e| e.to_str()) {
                    Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                    _ => figment.merge(Toml::file(path)),
                }
            },
            None => match Self::default_dir() {
                Some(dir) => figment
                    .merge(Toml::file(dir.join("config.toml")))
                    .merge(Yaml::file(dir.join("config.yaml"))),
                None => figment,
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that is only interpreted later on.
    pub fn validate(&self) -> Result<()> {
        self.name_filters()?;
        self.resilience()?;
        Ok(())
    }

    pub fn name_filters(&self) -> Result<NameFilters> {
        let files = Filter::new(self.include.as_deref(), self.exclude.as_deref()).or_raise(|| ErrorKind::InvalidPattern)?;
        let folders =
            Filter::new(self.include_dir.as_deref(), self.exclude_dir.as_deref()).or_raise(|| ErrorKind::InvalidPattern)?;
        Ok(NameFilters::new(files, folders))
    }

    pub fn resilience(&self) -> Result<ResilienceConfig> {
        let base_delay = seconds("backoff", self.backoff)?;
        let max_delay = seconds("max_backoff", self.max_backoff)?;
        if max_delay < base_delay {
            exn::bail!(ErrorKind::InvalidValue("max_backoff"));
        }
        Ok(ResilienceConfig {
            throttle: seconds("throttling", self.throttling)?,
            retries: self.retry,
            base_delay,
            max_delay,
        })
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            root_files: self.root_files,
            root_only: self.root_only,
            folders_only: self.list_folders,
            sort: self.list_sort,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            root_files: self.root_files || self.root_only,
            dry_run: self.dry_run,
        }
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).or_raise(|| ErrorKind::InvalidValue(field))
}
