//! `sitewatch list` - show monitor files and what they declare.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::basedir::{BaseDir, FileKind};
use crate::monfile::{MonitorFileReader, MonitorStep};

pub fn execute(dir: Option<&Path>) -> Result<()> {
    let base_dir = BaseDir::resolve(dir).context("Failed to resolve base directory")?;
    base_dir.ensure_prepared()?;

    let names = base_dir.monitor_files()?;
    if names.is_empty() {
        println!(
            "No monitor files in {}",
            base_dir.dir(FileKind::Monitor).display()
        );
        return Ok(());
    }

    let cache_dir = base_dir.dir(FileKind::Cache);
    for name in names {
        let path = base_dir.build_path(FileKind::Monitor, &name);
        match describe(&path, &cache_dir) {
            Ok((declared, monitors)) => println!(
                "{} {} {}",
                name.cyan(),
                declared.bold(),
                format!("({monitors} monitors)").dimmed()
            ),
            Err(e) => println!("{} {}: {:#}", name.cyan(), "invalid".red(), e),
        }
    }
    Ok(())
}

/// Declared name and number of valid monitors of one file
fn describe(path: &Path, cache_dir: &Path) -> Result<(String, usize)> {
    let mut reader = MonitorFileReader::open(path, cache_dir)?;
    let mut monitors = 0;
    while let Some(step) = reader.next_monitor()? {
        if matches!(step, MonitorStep::Ready(_)) {
            monitors += 1;
        }
    }
    Ok((reader.name().to_string(), monitors))
}
