//! Shared helpers for command handlers.

use std::path::Path;

use tracing::debug;

use fwsync_core::{ClusterDocument, MemoryBackend, ReconcileError};

use crate::error::CliError;

/// Read a cluster document. `.json` files parse as JSON, everything else
/// as YAML.
pub fn read_document(path: &Path) -> Result<ClusterDocument, CliError> {
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| CliError::Document {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        ClusterDocument::from_json(&contents)
    } else {
        ClusterDocument::from_yaml(&contents)
    };
    parsed.map_err(|err| match err {
        ReconcileError::Document(reason) => CliError::Document {
            path: display,
            reason,
        },
        other => other.into(),
    })
}

/// Load the management-service snapshot. A missing file is an empty
/// service, so the first `apply` can create the engine from scratch.
pub fn load_snapshot(path: &Path) -> Result<MemoryBackend, CliError> {
    if !path.exists() {
        debug!(path = %path.display(), "snapshot not found, starting empty");
        return Ok(MemoryBackend::new());
    }
    let contents = std::fs::read_to_string(path)?;
    MemoryBackend::from_json(&contents).map_err(|e| CliError::Snapshot {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn save_snapshot(path: &Path, backend: &MemoryBackend) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, backend.to_json()?)?;
    debug!(path = %path.display(), "snapshot saved");
    Ok(())
}
