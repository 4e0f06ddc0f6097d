use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use sitewatch::commands::process::ProcessOptions;
use sitewatch::commands::{list, prepare, process};
use sitewatch::engine::{Action, ERROR_EXIT};
use sitewatch::logging;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Watch web pages and report when queried content changes", long_about = None)]
#[command(version)]
struct Cli {
    /// Base directory (default: $SITEWATCH_DIR, then ~/.sitewatch; "." for current directory)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Check monitors even if their interval has not elapsed
    #[arg(short, long, global = true)]
    force: bool,

    /// More diagnostics (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report triggered monitors and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the current version of every monitored document
    Init {
        /// Monitor files (default: all files in the monitor directory)
        files: Vec<String>,
    },

    /// Check due monitors against the stored documents
    Check {
        /// Monitor files (default: all files in the monitor directory)
        files: Vec<String>,
    },

    /// Check due monitors and store documents whose monitors triggered
    Update {
        /// Monitor files (default: all files in the monitor directory)
        files: Vec<String>,
    },

    /// Delete the stored version of every monitored document
    Remove {
        /// Monitor files (default: all files in the monitor directory)
        files: Vec<String>,
    },

    /// Create the monitor, meta and cache subdirectories
    Prepare,

    /// List monitor files
    List,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ERROR_EXIT
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let options = |files: Vec<String>| ProcessOptions {
        dir: cli.dir.clone(),
        files,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let summary = match cli.command {
        Commands::Init { files } => process::execute(Action::Init, &options(files))?,
        Commands::Check { files } => process::execute(Action::Check, &options(files))?,
        Commands::Update { files } => process::execute(Action::Update, &options(files))?,
        Commands::Remove { files } => process::execute(Action::Remove, &options(files))?,
        Commands::Prepare => {
            prepare::execute(cli.dir.as_deref())?;
            return Ok(0);
        }
        Commands::List => {
            list::execute(cli.dir.as_deref())?;
            return Ok(0);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut io::stdout());
            return Ok(0);
        }
    };
    Ok(summary.exit_code())
}
