//! Command dispatch: bridges CLI args -> reconciler runs -> output formatting.

pub mod config_cmd;
pub mod reconcile;
pub mod show;
pub mod util;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed subcommand to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Validate(args) => reconcile::validate(&args, global),
        Command::Plan(args) => reconcile::plan(&args, global).await,
        Command::Apply(args) => reconcile::apply(&args, global).await,
        Command::Show(args) => show::handle(&args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            let mut cli = Cli::command();
            clap_complete::generate(args.shell, &mut cli, "fwsync", &mut std::io::stdout());
            Ok(())
        }
    }
}
