//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; console results are printed by the
//! command layer. `RUST_LOG` takes precedence over the verbosity flags.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map `-q` / `-v` flags to a default filter directive.
pub fn filter_directive(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(quiet: bool, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(quiet, verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}
