//! CLI configuration: thin wrapper around `fwsync_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--profile, --snapshot).

use std::path::PathBuf;

use fwsync_core::{RunMode, RunOptions};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fwsync_config::{
    Config, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Snapshot file for this invocation (flag > env > profile).
pub fn resolve_snapshot(global: &GlobalOpts, config: &Config) -> Result<PathBuf, CliError> {
    if let Some(path) = &global.snapshot {
        return Ok(path.clone());
    }
    let name = active_profile_name(global, config);
    match config.profile(&name) {
        Ok(profile) => Ok(fwsync_config::resolve_snapshot_path(profile, &config_path())),
        // An explicitly requested profile must exist.
        Err(err) if global.profile.is_some() => Err(err.into()),
        Err(_) => Err(CliError::NoSnapshot { profile: name }),
    }
}

/// Run options from the active profile, with the `--skip-interfaces` flag
/// layered on top.
pub fn run_options(
    global: &GlobalOpts,
    config: &Config,
    mode: RunMode,
    skip_interfaces: bool,
) -> RunOptions {
    let name = active_profile_name(global, config);
    let base = config.profile(&name).map_or_else(
        |_| RunOptions::apply().with_skip_interfaces(config.defaults.skip_interfaces),
        |profile| fwsync_config::profile_to_run_options(profile, &config.defaults),
    );
    RunOptions {
        mode,
        skip_interfaces: base.skip_interfaces || skip_interfaces,
    }
}
