//! Rendering for run reports, snapshot listings and config.
//!
//! `--output json|json-compact|yaml` serializes the value itself; `table`
//! and `plain` are laid out by the caller, since a run report and an
//! engine listing read differently.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Palette ─────────────────────────────────────────────────────────

/// What a highlighted piece of text says about the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Add,
    Change,
    Remove,
    Muted,
}

/// Highlighting for human-readable output. A disabled palette returns
/// text untouched.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(mode: &ColorMode) -> Self {
        let enabled = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
            }
        };
        Self { enabled }
    }

    pub fn paint(self, text: &str, tone: Tone) -> String {
        if !self.enabled {
            return text.to_owned();
        }
        match tone {
            Tone::Add => text.green().to_string(),
            Tone::Change => text.yellow().bold().to_string(),
            Tone::Remove => text.red().to_string(),
            Tone::Muted => text.dimmed().to_string(),
        }
    }

    /// Run status line value.
    pub fn status(self, changed: bool) -> String {
        if changed {
            self.paint("changed", Tone::Change)
        } else {
            self.paint("ok", Tone::Add)
        }
    }
}

// ── Renderers ───────────────────────────────────────────────────────

/// JSON or YAML for the structured formats; `None` for table and plain.
fn structured<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Option<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(rendered.unwrap_or_else(|e| format!("serialization failed: {e}")))
}

/// One value: `detail` lays out the table view, `id` the plain one.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    data: &T,
    detail: impl Fn(&T) -> String,
    id: impl Fn(&T) -> String,
) -> String {
    structured(format, data).unwrap_or_else(|| match format {
        OutputFormat::Plain => id(data),
        _ => detail(data),
    })
}

/// Many values: one table row or one plain line each.
pub fn render_list<T: Serialize, R: Tabled>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id: impl Fn(&T) -> String,
) -> String {
    structured(format, data).unwrap_or_else(|| match format {
        OutputFormat::Plain => data.iter().map(id).collect::<Vec<_>>().join("\n"),
        _ => render_table(data.iter().map(to_row)),
    })
}

pub fn render_table<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Write to stdout unless quiet. A closed pipe is not worth an error.
pub fn emit(rendered: &str, quiet: bool) {
    if quiet || rendered.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{rendered}");
}
