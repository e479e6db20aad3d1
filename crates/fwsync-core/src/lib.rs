//! Desired-state reconciliation for clustered firewall engines.
//!
//! This crate owns the domain model and the reconciliation logic that
//! converges a cluster engine held by a management service towards a
//! declarative document:
//!
//! - **Domain model** ([`model`]): the desired document
//!   ([`ClusterDocument`] → [`DesiredCluster`]) with its interface, VLAN,
//!   SNMP and BGP specs, and the remote mirror ([`EngineState`],
//!   [`RemoteInterface`], [`RoutingNode`]) it is diffed against.
//!
//! - **[`ManagementBackend`]**: the async seam to the management
//!   service: a few reads plus [`execute`](ManagementBackend::execute) for
//!   every [`Command`]. [`MemoryBackend`] implements it in-process and
//!   persists to a JSON snapshot.
//!
//! - **[`Reconciler`]**: runs one document against one engine. Validates,
//!   resolves element references in one batch, then drives the
//!   reconcilers in dependency order through a [`Session`] that journals
//!   every command and, in check mode, only plans them.
//!
//! - **Reconcilers** ([`reconcile`]): interfaces and VLANs with route
//!   cleanup, general settings, SNMP, BGP and peerings, management
//!   selectors, tags.

pub mod backend;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod resolver;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{Lookup, ManagementBackend, MemoryBackend};
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::{RunMode, RunOptions};
pub use engine::{Reconciler, RunReport};
pub use error::{ReconcileError, RemoteError, ValidationError};
pub use resolver::{ResolvedReferences, resolve_references};
pub use session::Session;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ClusterDocument, ClusterMode, DesiredCluster, DesiredState, ElementKind, ElementRef,
    EngineSettings, EngineState, Handle, InterfaceGroups, InterfaceKind, InterfaceOptions,
    InterfaceSpec, RemoteInterface, RoutingNode,
};
