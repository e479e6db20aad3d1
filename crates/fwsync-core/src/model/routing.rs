// ── Routing table ──
//
// One node per routed interface. Networks that no longer match an
// address on the interface stay in the table flagged invalid until
// they are cleaned up.

use serde::{Deserialize, Serialize};

use super::handle::Handle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringAttachment {
    pub peering: Handle,
    pub next_hop: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingNetwork {
    pub network: String,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub peerings: Vec<PeeringAttachment>,
}

impl RoutingNetwork {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            invalid: false,
            peerings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingNode {
    pub name: String,
    pub interface_id: String,
    #[serde(default)]
    pub networks: Vec<RoutingNetwork>,
}

impl RoutingNode {
    pub fn vlan_route_name(routing_id: &str) -> String {
        format!("VLAN {routing_id}")
    }

    pub fn interface_route_name(interface_id: &str) -> String {
        format!("Interface {interface_id}")
    }

    /// A node for a flat interface (`"1"`) or a VLAN (`"2.3"`).
    pub fn for_interface(routing_id: &str) -> Self {
        let name = if routing_id.contains('.') {
            Self::vlan_route_name(routing_id)
        } else {
            Self::interface_route_name(routing_id)
        };
        Self {
            name,
            interface_id: routing_id.to_owned(),
            networks: Vec::new(),
        }
    }

    /// Top-level interface this node hangs off.
    pub fn parent_id(&self) -> &str {
        self.interface_id
            .split_once('.')
            .map_or(self.interface_id.as_str(), |(parent, _)| parent)
    }

    pub fn network(&self, network: &str) -> Option<&RoutingNetwork> {
        self.networks.iter().find(|n| n.network == network)
    }

    /// Whether `peering` is attached, on `network` or on any network.
    pub fn has_peering(&self, network: Option<&str>, peering: &Handle) -> bool {
        self.networks
            .iter()
            .filter(|n| network.is_none_or(|want| n.network == want))
            .any(|n| n.peerings.iter().any(|p| &p.peering == peering))
    }
}
