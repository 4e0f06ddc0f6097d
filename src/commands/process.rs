//! `sitewatch init|check|update|remove [FILE...]`

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use super::console::{print_run_summary, ConsoleReporter};
use super::context::RunContext;
use crate::engine::{Action, Engine, RunSummary};

/// Options shared by the commands that walk monitor files
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub dir: Option<PathBuf>,
    pub files: Vec<String>,
    pub force: bool,
    pub quiet: bool,
    pub verbose: u8,
}

/// Run `action` over the selected monitor files and print the outcome.
pub fn execute(action: Action, options: &ProcessOptions) -> Result<RunSummary> {
    let ctx = RunContext::load(options.dir.as_deref())?;
    let files = ctx.monitor_files(&options.files)?;
    info!(?action, files = files.len(), force = options.force, "processing monitor files");

    let engine = Engine::new(&ctx.base_dir, &ctx.fetcher).force(options.force);
    let mut reporter = ConsoleReporter::new(options.quiet, options.verbose > 0);
    let summary = engine.run(action, &files, &mut reporter);

    if !options.quiet {
        print_run_summary(&summary);
    }
    Ok(summary)
}
