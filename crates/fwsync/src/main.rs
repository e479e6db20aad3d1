//! `fwsync`: converge clustered firewall engines to a declarative document.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    match commands::dispatch(cli.command, &cli.global).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = u8::try_from(err.exit_code()).unwrap_or(1);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

/// Reconciler progress goes to stderr so reports on stdout stay
/// parseable. `RUST_LOG` overrides `-v`/`-q`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 2)
        .with_writer(io::stderr)
        .init();
}
