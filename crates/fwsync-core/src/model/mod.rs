// ── Domain model ──
//
// Desired state (what the user declares) on one side, the remote
// mirror of the engine (what the management service holds) on the
// other. Reconcilers diff the two.

pub mod handle;

pub mod bgp;
pub mod desired;
pub mod document;
pub mod engine;
pub mod interface;
pub mod routing;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use fwsync_core::model::*` gives you everything.

// Core identity
pub use handle::{ElementKind, ElementRef, Handle, MacAddress};

// Desired state
pub use bgp::{AnnouncedNetworkSpec, AutonomousSystemSpec, BgpSpec, NextHop, PeeringSpec};
pub use desired::{InterfaceGroup, InterfaceGroups, InterfaceSpec, NodeSpec, RawInterface, RawNode};
pub use document::{ClusterDocument, DesiredCluster, DesiredState, GeneralSpec, SnmpSpec};

// Remote mirror
pub use engine::{
    AnnouncedNetwork, BgpSettings, ClusterMode, ClusterNode, EngineSettings, EngineState, Feature,
    InterfaceOptions, SnmpSettings,
};
pub use interface::{
    AddressList, ClusterAddress, CviMode, FlatInterface, InterfaceKind, RemoteInterface,
    VlanCollection, VlanInterface,
};
pub use routing::{PeeringAttachment, RoutingNetwork, RoutingNode};
