//! `sitewatch prepare` - create the base directory layout.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::basedir::BaseDir;

pub fn execute(dir: Option<&Path>) -> Result<()> {
    let base_dir = BaseDir::resolve(dir).context("Failed to resolve base directory")?;
    let Some(root) = base_dir.root() else {
        bail!("Nothing to prepare in current directory mode. Use --dir or SITEWATCH_DIR.");
    };

    let created = base_dir.prepare()?;
    if created.is_empty() {
        println!(
            "{} {} is already prepared",
            "✓".green(),
            root.display().to_string().cyan()
        );
    } else {
        for path in &created {
            println!("{} Created {}", "✓".green(), path.display());
        }
    }
    Ok(())
}
