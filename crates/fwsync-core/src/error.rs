// ── Core error types ──
//
// Errors surfaced by a reconciliation run. Validation and reference
// failures happen before any mutation; remote failures abort the run
// mid-flight and carry the changed flag accumulated up to that point.

use thiserror::Error;

use crate::model::ElementRef;

/// The desired document is malformed or inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("duplicate {what} '{value}' in {context}")]
    Duplicate {
        what: String,
        value: String,
        context: String,
    },

    #[error("{message}")]
    Requirement { message: String },
}

impl ValidationError {
    pub(crate) fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn requirement(message: impl Into<String>) -> Self {
        Self::Requirement {
            message: message.into(),
        }
    }
}

/// A call against the management service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{kind} not found: {identifier}")]
    NotFound { kind: String, identifier: String },

    #[error("{kind} '{identifier}' already exists")]
    Conflict { kind: String, identifier: String },

    #[error("operation {operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    #[error("management backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    pub(crate) fn not_found(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    pub(crate) fn conflict(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }
}

/// Unified error type for a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("unresolved element references: {}", format_missing(.missing))]
    UnresolvedReferences { missing: Vec<ElementRef> },

    #[error("remote operation failed (changed={changed}): {source}")]
    Remote {
        #[source]
        source: RemoteError,
        /// Whether any mutation was applied before the failure.
        changed: bool,
    },

    #[error("invalid document: {0}")]
    Document(String),
}

impl ReconcileError {
    /// Whether mutations were applied before the run aborted.
    pub fn changed(&self) -> bool {
        match self {
            Self::Remote { changed, .. } => *changed,
            _ => false,
        }
    }
}

fn format_missing(missing: &[ElementRef]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    #[test]
    fn unresolved_lists_every_reference() {
        let err = ReconcileError::UnresolvedReferences {
            missing: vec![
                ElementRef::new(ElementKind::Network, "net-a"),
                ElementRef::new(ElementKind::RouteMap, "rm"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "unresolved element references: network 'net-a', route_map 'rm'"
        );
    }

    #[test]
    fn only_remote_errors_report_changes() {
        let remote = ReconcileError::Remote {
            source: RemoteError::Backend("boom".into()),
            changed: true,
        };
        assert!(remote.changed());
        assert!(!ReconcileError::from(ValidationError::requirement("x")).changed());
    }
}
