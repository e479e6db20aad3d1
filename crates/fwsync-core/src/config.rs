// ── Run configuration ──
//
// These types describe *how* a reconciliation run behaves. They never
// touch disk; the CLI builds a `RunOptions` from its profile and flags
// and hands it in.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Whether mutations are sent or only recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    /// Send every command to the backend.
    #[default]
    Apply,
    /// Read and diff as usual, but record commands instead of sending them.
    Check,
}

/// Options for a single run against one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Leave interfaces alone regardless of what the document says.
    pub skip_interfaces: bool,
}

impl RunOptions {
    pub fn check() -> Self {
        Self {
            mode: RunMode::Check,
            ..Self::default()
        }
    }

    pub fn apply() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_skip_interfaces(mut self, skip: bool) -> Self {
        self.skip_interfaces = skip;
        self
    }
}
