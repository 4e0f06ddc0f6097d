//! Setup shared by the commands that process monitor files.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::basedir::{BaseDir, FileKind};
use crate::config::Config;
use crate::fetch::HttpFetcher;

/// Base directory and fetcher for one invocation
pub struct RunContext {
    pub base_dir: BaseDir,
    pub fetcher: HttpFetcher,
}

impl RunContext {
    /// Resolve the base directory and build the fetcher from its configuration.
    ///
    /// The base directory must be prepared.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let base_dir = BaseDir::resolve(dir).context("Failed to resolve base directory")?;
        base_dir.ensure_prepared()?;

        let config = Config::load(&base_dir.config_dir())?;
        debug!(?config, "loaded configuration");
        let fetcher = HttpFetcher::new(&config.fetch).context("Failed to set up fetcher")?;

        Ok(Self { base_dir, fetcher })
    }

    /// Monitor files named on the command line, or every file in `monitor/`.
    pub fn monitor_files(&self, args: &[String]) -> Result<Vec<PathBuf>> {
        if !args.is_empty() {
            return Ok(args
                .iter()
                .map(|arg| self.base_dir.monitor_file_path(arg))
                .collect());
        }

        if self.base_dir.is_current_dir() {
            bail!("No monitor files given. Name them, or use a base directory with a monitor/ subdirectory.");
        }

        let names = self.base_dir.monitor_files()?;
        if names.is_empty() {
            bail!(
                "No monitor files in {}",
                self.base_dir.dir(FileKind::Monitor).display()
            );
        }
        Ok(names
            .iter()
            .map(|name| self.base_dir.build_path(FileKind::Monitor, name))
            .collect())
    }
}
