//! Clap derive structures for the `fwsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fwsync -- converge clustered firewall engines to a declarative document
#[derive(Debug, Parser)]
#[command(
    name = "fwsync",
    version,
    about = "Reconcile clustered firewall engines against a desired-state document",
    long_about = "Diffs a cluster document (interfaces, VLANs, BGP, SNMP, engine settings,\n\
        tags) against the engine held by the management service and issues the\n\
        minimal set of changes. Runs against a JSON snapshot of the service.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "FWSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Management-service snapshot file (overrides profile)
    #[arg(long, short = 's', env = "FWSYNC_SNAPSHOT", global = true)]
    pub snapshot: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FWSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a cluster document without touching the management service
    Validate(DocumentArgs),

    /// Show the changes a document would make (check mode)
    #[command(alias = "diff")]
    Plan(RunArgs),

    /// Converge the engine to a document and save the snapshot
    Apply(RunArgs),

    /// Show engines held in the snapshot
    #[command(alias = "ls")]
    Show(ShowArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECONCILIATION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// Cluster document (YAML or JSON)
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Cluster document (YAML or JSON)
    pub file: PathBuf,

    /// Leave interfaces untouched regardless of the document
    #[arg(long)]
    pub skip_interfaces: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Engine name; lists every engine when omitted
    pub name: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key: snapshot or skip_interfaces
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
