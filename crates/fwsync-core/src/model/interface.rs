// ── Remote interface model ──
//
// Live mirror of the physical interfaces on a cluster engine. An
// interface is either flat (zero or more CVI/NDI addresses) or a
// collection of VLAN sub-interfaces, never both.

use serde::{Deserialize, Serialize};

use super::desired::{InterfaceSpec, NodeSpec};
use super::handle::{Handle, MacAddress};

/// How a cluster virtual address distributes traffic to the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CviMode {
    #[serde(rename = "packetdispatch")]
    PacketDispatch,
}

// ── Addresses ───────────────────────────────────────────────────────

/// One address on a cluster interface. The CVI carries no `nodeid`;
/// every NDI belongs to exactly one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAddress {
    pub address: String,
    pub network_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodeid: Option<u8>,
}

impl ClusterAddress {
    pub fn cvi(address: impl Into<String>, network_value: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            network_value: network_value.into(),
            nodeid: None,
        }
    }

    pub fn ndi(node: &NodeSpec) -> Self {
        Self {
            address: node.address.clone(),
            network_value: node.network_value.clone(),
            nodeid: Some(node.nodeid),
        }
    }

    pub fn is_cvi(&self) -> bool {
        self.nodeid.is_none()
    }
}

/// Sequence view over the addresses of a flat interface or a VLAN.
pub trait AddressList {
    fn addresses(&self) -> &[ClusterAddress];

    fn addresses_mut(&mut self) -> &mut Vec<ClusterAddress>;

    fn len(&self) -> usize {
        self.addresses().len()
    }

    fn is_empty(&self) -> bool {
        self.addresses().is_empty()
    }

    /// Whether any address (CVI or NDI) is configured.
    fn has_interfaces(&self) -> bool {
        !self.is_empty()
    }

    fn cvi(&self) -> Option<&ClusterAddress> {
        self.addresses().iter().find(|a| a.is_cvi())
    }

    fn cvi_mut(&mut self) -> Option<&mut ClusterAddress> {
        self.addresses_mut().iter_mut().find(|a| a.is_cvi())
    }

    /// Node dedicated addresses, in stored order.
    fn nodes(&self) -> impl Iterator<Item = &ClusterAddress> {
        self.addresses().iter().filter(|a| !a.is_cvi())
    }

    fn node(&self, nodeid: u8) -> Option<&ClusterAddress> {
        self.addresses().iter().find(|a| a.nodeid == Some(nodeid))
    }

    fn node_mut(&mut self, nodeid: u8) -> Option<&mut ClusterAddress> {
        self.addresses_mut()
            .iter_mut()
            .find(|a| a.nodeid == Some(nodeid))
    }

    /// Distinct networks, in first-seen order.
    fn networks(&self) -> Vec<String> {
        let mut networks: Vec<String> = Vec::new();
        for address in self.addresses() {
            if !networks.contains(&address.network_value) {
                networks.push(address.network_value.clone());
            }
        }
        networks
    }
}

// ── Flat interface ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvi_mode: Option<CviMode>,
    #[serde(default)]
    pub addresses: Vec<ClusterAddress>,
}

impl FlatInterface {
    /// Build the address block declared by a non-VLAN spec.
    pub fn from_spec(spec: &InterfaceSpec) -> Self {
        let mut flat = Self::default();
        if let (Some(cvi), Some(mask)) = (&spec.cluster_virtual, &spec.network_value) {
            flat.addresses.push(ClusterAddress::cvi(cvi, mask));
            flat.macaddress.clone_from(&spec.macaddress);
            flat.cvi_mode = spec.cvi_mode;
        }
        flat.addresses.extend(spec.nodes.iter().map(ClusterAddress::ndi));
        flat
    }
}

impl AddressList for FlatInterface {
    fn addresses(&self) -> &[ClusterAddress] {
        &self.addresses
    }

    fn addresses_mut(&mut self) -> &mut Vec<ClusterAddress> {
        &mut self.addresses
    }
}

// ── VLAN sub-interfaces ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanInterface {
    /// Routing identity, `"{interface_id}.{vlan_id}"`.
    pub interface_id: String,
    pub vlan_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_ref: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvi_mode: Option<CviMode>,
    #[serde(default)]
    pub addresses: Vec<ClusterAddress>,
}

impl VlanInterface {
    pub fn new(parent_id: &str, vlan_id: &str) -> Self {
        Self {
            interface_id: format!("{parent_id}.{vlan_id}"),
            vlan_id: vlan_id.to_owned(),
            zone_ref: None,
            macaddress: None,
            cvi_mode: None,
            addresses: Vec::new(),
        }
    }

    /// Build a new VLAN from its spec: CVI (with MAC and dispatch mode
    /// when given) or VLAN-only, then one NDI per node.
    pub fn from_spec(parent_id: &str, spec: &InterfaceSpec, zone_ref: Option<Handle>) -> Self {
        let vlan_id = spec.vlan_id.as_deref().unwrap_or_default();
        let mut vlan = Self::new(parent_id, vlan_id);
        vlan.zone_ref = zone_ref;
        vlan.populate(spec);
        vlan
    }

    /// Add the addresses an `InterfaceSpec` declares to an addressless VLAN.
    /// Returns false when the desired VLAN declares nothing to add.
    pub fn populate(&mut self, spec: &InterfaceSpec) -> bool {
        let mut added = false;
        if let (Some(cvi), Some(mask)) = (&spec.cluster_virtual, &spec.network_value) {
            self.addresses.push(ClusterAddress::cvi(cvi, mask));
            if spec.macaddress.is_some() {
                self.macaddress.clone_from(&spec.macaddress);
                self.cvi_mode = spec.cvi_mode;
            } else {
                self.cvi_mode = None;
            }
            added = true;
        }
        for node in &spec.nodes {
            self.addresses.push(ClusterAddress::ndi(node));
            added = true;
        }
        added
    }

    pub fn clear_addresses(&mut self) {
        self.addresses.clear();
    }
}

impl AddressList for VlanInterface {
    fn addresses(&self) -> &[ClusterAddress] {
        &self.addresses
    }

    fn addresses_mut(&mut self) -> &mut Vec<ClusterAddress> {
        &mut self.addresses
    }
}

/// The VLAN sub-interfaces of one physical interface, keyed by `vlan_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanCollection {
    #[serde(default)]
    pub vlans: Vec<VlanInterface>,
}

impl VlanCollection {
    pub fn len(&self) -> usize {
        self.vlans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vlans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VlanInterface> {
        self.vlans.iter()
    }

    pub fn vlan_ids(&self) -> Vec<String> {
        self.vlans.iter().map(|v| v.vlan_id.clone()).collect()
    }

    pub fn contains(&self, vlan_id: &str) -> bool {
        self.get(vlan_id).is_some()
    }

    pub fn get(&self, vlan_id: &str) -> Option<&VlanInterface> {
        self.vlans.iter().find(|v| v.vlan_id == vlan_id)
    }

    pub fn get_mut(&mut self, vlan_id: &str) -> Option<&mut VlanInterface> {
        self.vlans.iter_mut().find(|v| v.vlan_id == vlan_id)
    }

    pub fn push(&mut self, vlan: VlanInterface) {
        self.vlans.push(vlan);
    }

    pub fn remove(&mut self, vlan_id: &str) -> Option<VlanInterface> {
        let index = self.vlans.iter().position(|v| v.vlan_id == vlan_id)?;
        Some(self.vlans.remove(index))
    }
}

// ── Physical interface ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterfaceKind {
    Flat(FlatInterface),
    Vlan(VlanCollection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInterface {
    pub interface_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_ref: Option<Handle>,
    pub kind: InterfaceKind,
}

impl RemoteInterface {
    pub fn flat(interface_id: impl Into<String>, flat: FlatInterface) -> Self {
        Self {
            interface_id: interface_id.into(),
            zone_ref: None,
            kind: InterfaceKind::Flat(flat),
        }
    }

    pub fn vlans(interface_id: impl Into<String>, vlans: Vec<VlanInterface>) -> Self {
        Self {
            interface_id: interface_id.into(),
            zone_ref: None,
            kind: InterfaceKind::Vlan(VlanCollection { vlans }),
        }
    }

    pub fn as_flat(&self) -> Option<&FlatInterface> {
        match &self.kind {
            InterfaceKind::Flat(flat) => Some(flat),
            InterfaceKind::Vlan(_) => None,
        }
    }

    pub fn as_vlans(&self) -> Option<&VlanCollection> {
        match &self.kind {
            InterfaceKind::Vlan(vlans) => Some(vlans),
            InterfaceKind::Flat(_) => None,
        }
    }

    pub fn as_vlans_mut(&mut self) -> Option<&mut VlanCollection> {
        match &mut self.kind {
            InterfaceKind::Vlan(vlans) => Some(vlans),
            InterfaceKind::Flat(_) => None,
        }
    }

    /// Whether at least one VLAN sub-interface is defined.
    pub fn has_vlan(&self) -> bool {
        self.as_vlans().is_some_and(|v| !v.is_empty())
    }

    /// Whether any address is configured, on the interface or its VLANs.
    pub fn has_interfaces(&self) -> bool {
        match &self.kind {
            InterfaceKind::Flat(flat) => flat.has_interfaces(),
            InterfaceKind::Vlan(vlans) => vlans.iter().any(AddressList::has_interfaces),
        }
    }

    /// No addresses and no VLANs: a reserved slot.
    pub fn is_addressless(&self) -> bool {
        !self.has_vlan() && !self.has_interfaces()
    }

    /// Clear every address and VLAN.
    pub fn reset(&mut self) {
        self.zone_ref = None;
        self.kind = InterfaceKind::Flat(FlatInterface::default());
    }
}
