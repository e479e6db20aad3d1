// ── Management backend ──
//
// The reconciler talks to the management service only through this
// trait: a handful of reads plus one `execute` entry point for every
// `Command`. `MemoryBackend` is the in-process implementation.

pub mod memory;

use crate::command::{Command, CommandResult};
use crate::error::RemoteError;
use crate::model::{ElementKind, EngineState, Handle, RemoteInterface, RoutingNode};

pub use memory::MemoryBackend;

/// Outcome of a lookup that may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// Reads and writes against the service holding engine configuration.
///
/// Every call is awaited before the next one is issued; implementations
/// need not be `Sync`.
#[allow(async_fn_in_trait)]
pub trait ManagementBackend {
    /// Full engine document, or `None` when no engine has that name.
    async fn fetch_engine(&self, name: &str) -> Result<Option<EngineState>, RemoteError>;

    async fn interface(
        &self,
        engine: &str,
        interface_id: &str,
    ) -> Result<Lookup<RemoteInterface>, RemoteError>;

    async fn interfaces(&self, engine: &str) -> Result<Vec<RemoteInterface>, RemoteError>;

    async fn routing(&self, engine: &str) -> Result<Vec<RoutingNode>, RemoteError>;

    /// Resolve a named element to its handle.
    async fn resolve(&self, kind: ElementKind, name: &str) -> Result<Option<Handle>, RemoteError>;

    async fn execute(&mut self, engine: &str, command: &Command)
    -> Result<CommandResult, RemoteError>;
}
