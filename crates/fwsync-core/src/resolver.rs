// ── Reference resolution ──
//
// Named element references are resolved in one batch before any
// mutation. The result is an explicit value handed to the reconcilers
// that need it; nothing is cached elsewhere.

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::debug;

use crate::backend::ManagementBackend;
use crate::error::{ReconcileError, RemoteError};
use crate::model::{ElementKind, ElementRef, Handle};

/// Handles for every resolved reference plus the names that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedReferences {
    handles: HashMap<ElementRef, Handle>,
    missing: Vec<ElementRef>,
}

impl ResolvedReferences {
    pub fn handle(&self, reference: &ElementRef) -> Option<&Handle> {
        self.handles.get(reference)
    }

    pub fn get(&self, kind: ElementKind, name: &str) -> Option<&Handle> {
        self.handle(&ElementRef::new(kind, name))
    }

    pub fn missing(&self) -> &[ElementRef] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Fail with the full list of unresolved names, if any.
    pub fn into_complete(self) -> Result<Self, ReconcileError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ReconcileError::UnresolvedReferences {
                missing: self.missing,
            })
        }
    }

    pub(crate) fn insert(&mut self, reference: ElementRef, handle: Handle) {
        self.handles.insert(reference, handle);
    }
}

/// Resolve each distinct reference once, in first-seen order.
pub async fn resolve_references<B: ManagementBackend>(
    backend: &B,
    references: impl IntoIterator<Item = ElementRef>,
) -> Result<ResolvedReferences, RemoteError> {
    let pending: IndexSet<ElementRef> = references.into_iter().collect();
    let mut resolved = ResolvedReferences::default();
    for reference in pending {
        match backend.resolve(reference.kind, &reference.name).await? {
            Some(handle) => {
                debug!(%reference, %handle, "resolved reference");
                resolved.insert(reference, handle);
            }
            None => resolved.missing.push(reference),
        }
    }
    Ok(resolved)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn accumulates_every_missing_reference() {
        let mut backend = MemoryBackend::new();
        let net = backend.add_element(ElementKind::Network, "net-a");

        let refs = vec![
            ElementRef::new(ElementKind::Network, "net-a"),
            ElementRef::new(ElementKind::RouteMap, "rm"),
            ElementRef::new(ElementKind::Network, "net-a"),
            ElementRef::new(ElementKind::Host, "ghost"),
        ];
        let resolved = resolve_references(&backend, refs).await.unwrap();
        assert_eq!(resolved.get(ElementKind::Network, "net-a"), Some(&net));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.missing().len(), 2);

        let err = resolved.into_complete().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unresolved element references: route_map 'rm', host 'ghost'"
        );
    }

    #[tokio::test]
    async fn empty_input_is_complete() {
        let backend = MemoryBackend::new();
        let resolved = resolve_references(&backend, Vec::new()).await.unwrap();
        assert!(resolved.is_complete());
        assert!(resolved.is_empty());
    }
}
