//! Validate, plan and apply handlers.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;
use tracing::{info, warn};

use fwsync_core::{
    Command as CoreCommand, DesiredCluster, ReconcileError, Reconciler, RunMode, RunReport,
};

use crate::cli::{DocumentArgs, GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Palette, Tone};

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Target")]
    target: String,
}

impl CommandRow {
    fn new(index: usize, command: &CoreCommand) -> Self {
        Self {
            index: index + 1,
            command: command.name().to_owned(),
            target: command.target(),
        }
    }
}

/// Whether a command adds to, edits or removes from the engine.
fn tone(command: &CoreCommand) -> Tone {
    let name = command.name();
    if name.starts_with("add_") || name.starts_with("create_") {
        Tone::Add
    } else if name.starts_with("delete_") || name.starts_with("remove_") {
        Tone::Remove
    } else {
        Tone::Change
    }
}

fn report_detail(report: &RunReport, palette: Palette) -> String {
    let verb = match report.mode {
        RunMode::Check => "planned",
        RunMode::Apply => "applied",
    };
    let mut out = format!(
        "Engine:   {}\nStatus:   {}\nCommands: {} {verb}",
        report.engine,
        palette.status(report.changed),
        report.commands.len(),
    );
    if report.commands.is_empty() {
        let _ = write!(out, "\n{}", palette.paint("Nothing to do.", Tone::Muted));
        return out;
    }

    let breakdown = [("add", Tone::Add), ("change", Tone::Change), ("remove", Tone::Remove)]
        .into_iter()
        .filter_map(|(label, wanted)| {
            let n = report.commands.iter().filter(|c| tone(c) == wanted).count();
            (n > 0).then(|| palette.paint(&format!("{n} {label}"), wanted))
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, " ({breakdown})");
    out.push_str(&output::render_table(
        report.commands.iter().enumerate().map(|(i, c)| CommandRow::new(i, c)),
    ));
    out
}

fn report_plain(report: &RunReport) -> String {
    report
        .commands
        .iter()
        .map(|c| format!("{}\t{}", c.name(), c.target()))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Validate ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DocumentSummary {
    name: String,
    state: String,
    interfaces: usize,
    vlans: usize,
    bgp: bool,
    snmp: bool,
    tags: Vec<String>,
    references: Vec<String>,
}

impl From<&DesiredCluster> for DocumentSummary {
    fn from(d: &DesiredCluster) -> Self {
        Self {
            name: d.name.clone(),
            state: d.state.to_string(),
            interfaces: d.interfaces.len(),
            vlans: d.interfaces.iter().map(|g| g.vlans().count()).sum(),
            bgp: d.bgp.as_ref().is_some_and(|b| b.enabled),
            snmp: d.snmp.as_ref().is_some_and(|s| s.enabled),
            tags: d.tags.clone(),
            references: d.references().iter().map(ToString::to_string).collect(),
        }
    }
}

fn summary_detail(s: &DocumentSummary) -> String {
    let yes_no = |b: bool| if b { "enabled" } else { "disabled" };
    let mut lines = vec![
        format!("Name:       {}", s.name),
        format!("State:      {}", s.state),
        format!("Interfaces: {} ({} VLANs)", s.interfaces, s.vlans),
        format!("BGP:        {}", yes_no(s.bgp)),
        format!("SNMP:       {}", yes_no(s.snmp)),
    ];
    if !s.tags.is_empty() {
        lines.push(format!("Tags:       {}", s.tags.join(", ")));
    }
    for (i, reference) in s.references.iter().enumerate() {
        let label = if i == 0 { "References:" } else { "" };
        lines.push(format!("{label:<12}{reference}"));
    }
    lines.join("\n")
}

pub fn validate(args: &DocumentArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let document = util::read_document(&args.file)?;
    let desired = DesiredCluster::from_document(document).map_err(ReconcileError::from)?;
    if desired.interfaces.is_empty() {
        info!(engine = %desired.name, "document declares no interfaces; it can only update an existing engine");
    }

    let summary = DocumentSummary::from(&desired);
    let out = output::render_single(&global.output, &summary, summary_detail, |s| s.name.clone());
    output::emit(&out, global.quiet);
    Ok(())
}

// ── Plan / apply ────────────────────────────────────────────────────

pub async fn plan(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let snapshot = config::resolve_snapshot(global, &cfg)?;
    let options = config::run_options(global, &cfg, RunMode::Check, args.skip_interfaces);

    let document = util::read_document(&args.file)?;
    let backend = util::load_snapshot(&snapshot)?;
    let mut reconciler = Reconciler::new(backend, options);
    let report = reconciler.run(document).await?;

    print_report(&report, global);
    Ok(())
}

pub async fn apply(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let snapshot = config::resolve_snapshot(global, &cfg)?;
    let options = config::run_options(global, &cfg, RunMode::Apply, args.skip_interfaces);

    let document = util::read_document(&args.file)?;
    let backend = util::load_snapshot(&snapshot)?;
    let mut reconciler = Reconciler::new(backend, options);
    let result = reconciler.run(document).await;
    let backend = reconciler.into_backend();

    match result {
        Ok(report) => {
            if report.changed {
                util::save_snapshot(&snapshot, &backend)?;
            }
            print_report(&report, global);
            Ok(())
        }
        Err(err) => {
            // Applied mutations stay applied; persist them.
            if err.changed() {
                warn!(path = %snapshot.display(), "saving partially applied changes");
                util::save_snapshot(&snapshot, &backend)?;
            }
            Err(err.into())
        }
    }
}

fn print_report(report: &RunReport, global: &GlobalOpts) {
    let palette = Palette::new(&global.color);
    let out = output::render_single(
        &global.output,
        report,
        |r| report_detail(r, palette),
        report_plain,
    );
    output::emit(&out, global.quiet);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;

    fn report(commands: Vec<CoreCommand>) -> RunReport {
        RunReport {
            engine: "fw".into(),
            mode: RunMode::Check,
            changed: !commands.is_empty(),
            commands,
            state: None,
        }
    }

    #[test]
    fn commands_are_grouped_by_effect() {
        let commands = vec![
            CoreCommand::AddTag { name: "dc1".into() },
            CoreCommand::ClearTags,
            CoreCommand::DeleteRouteNetwork {
                name: "VLAN 2.3".into(),
                network: "3.3.3.0/24".into(),
            },
            CoreCommand::DeleteRoute { name: "VLAN 2.4".into() },
        ];
        let text = report_detail(&report(commands), Palette::new(&ColorMode::Never));
        assert!(text.contains("Status:   changed"), "{text}");
        assert!(text.contains("4 planned (1 add, 1 change, 2 remove)"), "{text}");
        assert!(text.contains("delete_route_network"), "{text}");
    }

    #[test]
    fn empty_report_says_nothing_to_do() {
        let text = report_detail(&report(Vec::new()), Palette::new(&ColorMode::Never));
        assert!(text.contains("Status:   ok"), "{text}");
        assert!(text.ends_with("Nothing to do."), "{text}");
    }
}
