//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display as TOML-like text.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "skip_interfaces = {}", cfg.defaults.skip_interfaces);

    for name in cfg.profile_names() {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "snapshot = \"{}\"", p.snapshot.display());
        if let Some(skip) = p.skip_interfaces {
            let _ = writeln!(out, "skip_interfaces = {skip}");
        }
    }

    out
}

fn parse_bool(field: &str, value: &str) -> Result<bool, CliError> {
    value.parse().map_err(|_| CliError::ConfigValue {
        field: field.into(),
        reason: "must be 'true' or 'false'".into(),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::emit(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            });
            output::emit(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            match key.as_str() {
                "snapshot" => {
                    cfg.profiles
                        .entry(profile_name.clone())
                        .and_modify(|p| p.snapshot = value.clone().into())
                        .or_insert_with(|| Profile::new(value.clone()));
                }
                "skip_interfaces" | "skip-interfaces" => {
                    let skip = parse_bool("skip_interfaces", &value)?;
                    let profile = cfg.profiles.get_mut(&profile_name).ok_or_else(|| {
                        CliError::ConfigValue {
                            field: "skip_interfaces".into(),
                            reason: format!(
                                "profile '{profile_name}' has no snapshot yet; set one first"
                            ),
                        }
                    })?;
                    profile.skip_interfaces = Some(skip);
                }
                other => {
                    return Err(CliError::ConfigValue {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: snapshot, skip_interfaces"
                        ),
                    });
                }
            }

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fwsync config set snapshot <FILE>");
            } else {
                for name in cfg.profile_names() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            // Validate before switching.
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}
