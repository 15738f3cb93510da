mod cli;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use album_rsync_config::Config;
use album_rsync_library::{TreeWalker, sync};
use album_rsync_storage::{LocalStorage, NameFilters, Storage};
use clap::Parser;
use exn::ResultExt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref(), &cli.overrides);
    init_logging(loaded.as_ref().map_or(cli.overrides.verbose, |config| config.verbose));

    let result = match loaded.or_raise(|| ErrorKind::Config) {
        Ok(config) => run(&cli, &config, io::stdout().lock()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// Logs go to stderr so that listings on stdout stay clean. `RUST_LOG` wins
/// over the verbosity flag.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli, config: &Config, out: impl Write) -> Result<()> {
    let source_root = absolute(&cli.src)?;
    if !source_root.is_dir() {
        exn::bail!(ErrorKind::MissingSource(source_root));
    }
    let filters = config.name_filters().or_raise(|| ErrorKind::Config)?;
    let source = open("source", &source_root, filters)?;

    match cli.sync_target() {
        None => {
            let mut walker = TreeWalker::new(&source, config.walk_options(), out);
            walker.walk().await.or_raise(|| ErrorKind::Listing)?;
        },
        Some(dest) => {
            let dest = open("destination", &absolute(dest)?, NameFilters::default())?;
            sync(&source, &dest, config.sync_options()).await.or_raise(|| ErrorKind::Sync)?;
            dest.logout().await.or_raise(|| ErrorKind::Storage)?;
        },
    }
    source.logout().await.or_raise(|| ErrorKind::Storage)
}

fn open(name: &str, root: &Path, filters: NameFilters) -> Result<LocalStorage> {
    tracing::debug!(storage = name, root = %root.display(), "Opening local storage");
    Ok(LocalStorage::new(name, root).or_raise(|| ErrorKind::Storage)?.with_filters(filters))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).or_raise(|| ErrorKind::Storage)
}
