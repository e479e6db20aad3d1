// ── Command API ──
//
// Every mutation against the management service flows through the
// `Command` enum. Reconcilers build commands; the session either sends
// them to the backend or, in check mode, only records them.

pub mod requests;

use serde::Serialize;
use strum::AsRefStr;

use crate::model::{EngineSettings, Handle, InterfaceOptions, InterfaceSpec, RemoteInterface};

pub use requests::{
    AttachPeeringRequest, ChangeClusterInterfaceRequest, CreateClusterRequest,
    CreateElementRequest,
};

/// All write operations against a managed engine.
#[derive(Debug, Clone, PartialEq, Serialize, AsRefStr)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    // ── Engine ───────────────────────────────────────────────────────
    CreateEngine(Box<CreateClusterRequest>),
    DeleteEngine,
    UpdateEngine(Box<EngineSettings>),
    SetInterfaceOptions(InterfaceOptions),

    // ── Interfaces ───────────────────────────────────────────────────
    /// Add a flat interface with CVI and/or node addresses.
    AddClusterVirtualInterface(InterfaceSpec),
    /// Add a VLAN, creating the physical interface when missing.
    AddVlanInterface(InterfaceSpec),
    /// Add a VLAN with its addresses to an existing interface.
    AddIpAddressAndVlan(InterfaceSpec),
    ChangeClusterInterface(ChangeClusterInterfaceRequest),
    ResetInterface {
        interface_id: String,
    },
    UpdateInterface(Box<RemoteInterface>),
    DeleteInterface {
        interface_id: String,
    },

    // ── Routing ──────────────────────────────────────────────────────
    DeleteRoute {
        name: String,
    },
    DeleteRouteNetwork {
        name: String,
        network: String,
    },
    AttachBgpPeering(AttachPeeringRequest),

    // ── Elements ─────────────────────────────────────────────────────
    CreateElement(CreateElementRequest),

    // ── Tags ─────────────────────────────────────────────────────────
    AddTag {
        name: String,
    },
    ClearTags,
}

impl Command {
    /// Stable snake_case name, e.g. `add_vlan_interface`.
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    /// What the command acts on, for logs and plan output.
    pub fn target(&self) -> String {
        match self {
            Self::CreateEngine(request) => request.name.clone(),
            Self::DeleteEngine | Self::UpdateEngine(_) | Self::SetInterfaceOptions(_) => {
                "engine".into()
            }
            Self::AddClusterVirtualInterface(spec)
            | Self::AddVlanInterface(spec)
            | Self::AddIpAddressAndVlan(spec) => spec.to_string(),
            Self::ChangeClusterInterface(request) => format!("interface {}", request.interface_id),
            Self::ResetInterface { interface_id } | Self::DeleteInterface { interface_id } => {
                format!("interface {interface_id}")
            }
            Self::UpdateInterface(interface) => format!("interface {}", interface.interface_id),
            Self::DeleteRoute { name } => name.clone(),
            Self::DeleteRouteNetwork { name, network } => format!("{name} / {network}"),
            Self::AttachBgpPeering(request) => {
                format!("{} on {}", request.peering, request.interface_id)
            }
            Self::CreateElement(request) => format!("{} '{}'", request.kind, request.name),
            Self::AddTag { name } => name.clone(),
            Self::ClearTags => "tags".into(),
        }
    }

    /// Commands after which the routing table must be re-derived.
    pub fn touches_interfaces(&self) -> bool {
        matches!(
            self,
            Self::AddClusterVirtualInterface(_)
                | Self::AddVlanInterface(_)
                | Self::AddIpAddressAndVlan(_)
                | Self::ChangeClusterInterface(_)
                | Self::ResetInterface { .. }
                | Self::UpdateInterface(_)
                | Self::DeleteInterface { .. }
        )
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "handle", rename_all = "snake_case")]
pub enum CommandResult {
    Ok,
    /// Accepted, but the live state already matched.
    Unchanged,
    Created(Handle),
    /// Recorded in check mode, not sent.
    Planned,
}

impl CommandResult {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
