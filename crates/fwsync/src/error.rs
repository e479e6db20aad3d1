//! CLI error types with miette diagnostics.
//!
//! Maps `ReconcileError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fwsync_config::ConfigError;
use fwsync_core::{ReconcileError, RemoteError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Document ─────────────────────────────────────────────────────

    #[error("Could not read document {path}: {reason}")]
    #[diagnostic(
        code(fwsync::document),
        help("The document must be a YAML or JSON mapping with at least a `name`.")
    )]
    Document { path: String, reason: String },

    #[error("Invalid document: {reason}")]
    #[diagnostic(
        code(fwsync::validation),
        help("Nothing was changed. Fix the document and run: fwsync validate <FILE>")
    )]
    Validation { reason: String },

    #[error("Unresolved element references: {missing}")]
    #[diagnostic(
        code(fwsync::unresolved),
        help("Every referenced network, host, group, route map, BGP profile and next hop must exist before the run. Nothing was changed.")
    )]
    UnresolvedReferences { missing: String },

    // ── Management service ───────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(fwsync::not_found), help("{progress}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        progress: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(fwsync::conflict), help("{progress}"))]
    Conflict {
        resource_type: String,
        identifier: String,
        progress: String,
    },

    #[error("Management service rejected {operation}: {message}")]
    #[diagnostic(code(fwsync::rejected), help("{progress}"))]
    Rejected {
        operation: String,
        message: String,
        progress: String,
    },

    #[error("Management service error: {message}")]
    #[diagnostic(code(fwsync::backend), help("{progress}"))]
    Backend { message: String, progress: String },

    // ── Snapshot ─────────────────────────────────────────────────────

    #[error("No snapshot configured for profile '{profile}'")]
    #[diagnostic(
        code(fwsync::no_snapshot),
        help(
            "Pass --snapshot <FILE>, set FWSYNC_SNAPSHOT, or run:\n\
             fwsync config set snapshot <FILE> --profile {profile}"
        )
    )]
    NoSnapshot { profile: String },

    #[error("Invalid snapshot {path}: {reason}")]
    #[diagnostic(code(fwsync::snapshot))]
    Snapshot { path: String, reason: String },

    #[error("Engine '{name}' not found in snapshot")]
    #[diagnostic(code(fwsync::engine_not_found), help("Run: fwsync show"))]
    EngineNotFound { name: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fwsync::config_value))]
    ConfigValue { field: String, reason: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fwsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fwsync config set snapshot <FILE> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(fwsync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(fwsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Document { .. }
            | Self::Validation { .. }
            | Self::NoSnapshot { .. }
            | Self::ConfigValue { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            Self::UnresolvedReferences { .. }
            | Self::NotFound { .. }
            | Self::EngineNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::Validation { field, reason } => CliError::ConfigValue { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── ReconcileError → CliError mapping ────────────────────────────────

impl From<ReconcileError> for CliError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Validation(inner) => CliError::Validation {
                reason: inner.to_string(),
            },
            ReconcileError::Document(reason) => CliError::Validation { reason },
            ReconcileError::UnresolvedReferences { missing } => CliError::UnresolvedReferences {
                missing: missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            ReconcileError::Remote { source, changed } => remote(source, changed),
        }
    }
}

fn remote(source: RemoteError, changed: bool) -> CliError {
    let progress = if changed {
        "Earlier changes in this run were applied and are kept; re-run once the cause is fixed."
    } else {
        "Nothing was changed."
    }
    .to_owned();
    match source {
        RemoteError::NotFound { kind, identifier } => CliError::NotFound {
            resource_type: kind,
            identifier,
            progress,
        },
        RemoteError::Conflict { kind, identifier } => CliError::Conflict {
            resource_type: kind,
            identifier,
            progress,
        },
        RemoteError::Rejected { operation, message } => CliError::Rejected {
            operation,
            message,
            progress,
        },
        RemoteError::Backend(message) => CliError::Backend { message, progress },
    }
}
