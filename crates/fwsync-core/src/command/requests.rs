// ── Typed request structs for Command payloads ──
//
// Commands that carry more than an id use one of these request structs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{
    AutonomousSystemSpec, ClusterAddress, ClusterMode, CviMode, DesiredCluster, ElementKind,
    FlatInterface, Handle, InterfaceKind, InterfaceOptions, InterfaceSpec, MacAddress, NodeSpec,
    RemoteInterface, SnmpSettings,
};

// ── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct CreateClusterRequest {
    pub name: String,
    pub cluster_mode: ClusterMode,
    /// Number of cluster members.
    pub nodes: usize,
    #[serde(flatten)]
    pub interface_options: InterfaceOptions,
    /// One attribute map per declared interface or VLAN.
    pub interfaces: Vec<Map<String, Value>>,
    pub default_nat: bool,
    pub antivirus: bool,
    pub file_reputation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_server_address: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_server: Option<Handle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snmp: Option<SnmpSettings>,
}

impl CreateClusterRequest {
    pub fn from_desired(desired: &DesiredCluster, nodes: usize) -> Self {
        let general = &desired.general;
        let snmp = desired.snmp.as_ref().filter(|s| s.enabled).map(|s| {
            let mut settings = SnmpSettings::default();
            settings.enable(s.agent.clone(), s.location.clone(), s.interfaces.clone());
            settings
        });
        Self {
            name: desired.name.clone(),
            cluster_mode: general.cluster_mode,
            nodes,
            interface_options: desired.management.clone(),
            interfaces: desired
                .interfaces
                .specs()
                .map(InterfaceSpec::to_attributes)
                .collect(),
            default_nat: general.default_nat.unwrap_or(false),
            antivirus: general.antivirus.unwrap_or(false),
            file_reputation: general.file_reputation.unwrap_or(false),
            domain_server_address: general.domain_server_address.clone().unwrap_or_default(),
            location: general.location.clone(),
            comment: desired.comment.clone(),
            log_server: None,
            snmp,
        }
    }

    pub fn with_log_server(mut self, log_server: Option<Handle>) -> Self {
        self.log_server = log_server;
        self
    }

    /// Decode the attribute maps back into interface specs.
    pub fn interface_specs(&self) -> Result<Vec<InterfaceSpec>, serde_json::Error> {
        self.interfaces
            .iter()
            .map(|attrs| serde_json::from_value(Value::Object(attrs.clone())))
            .collect()
    }
}

// ── Interfaces ──────────────────────────────────────────────────────

/// Full replacement of the addresses on a flat cluster interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeClusterInterfaceRequest {
    pub interface_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_virtual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<MacAddress>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_ref: Option<Handle>,
}

impl ChangeClusterInterfaceRequest {
    pub fn from_spec(spec: &InterfaceSpec, zone_ref: Option<Handle>) -> Self {
        Self {
            interface_id: spec.interface_id.clone(),
            cluster_virtual: spec.cluster_virtual.clone(),
            network_value: spec.network_value.clone(),
            macaddress: spec.macaddress.clone(),
            nodes: spec.nodes.clone(),
            zone_ref,
        }
    }

    /// The address block this request leaves on the interface.
    pub fn to_flat(&self) -> FlatInterface {
        let mut flat = FlatInterface::default();
        if let (Some(cvi), Some(mask)) = (&self.cluster_virtual, &self.network_value) {
            flat.addresses.push(ClusterAddress::cvi(cvi, mask));
            flat.macaddress.clone_from(&self.macaddress);
            flat.cvi_mode = Some(CviMode::PacketDispatch);
        }
        flat.addresses
            .extend(self.nodes.iter().map(ClusterAddress::ndi));
        flat
    }

    /// Apply to a flat interface. Returns whether anything differed;
    /// VLAN collections are left untouched.
    pub fn apply(&self, interface: &mut RemoteInterface) -> bool {
        if matches!(interface.kind, InterfaceKind::Vlan(_)) {
            return false;
        }
        let flat = InterfaceKind::Flat(self.to_flat());
        let changed = interface.kind != flat || interface.zone_ref != self.zone_ref;
        interface.kind = flat;
        interface.zone_ref.clone_from(&self.zone_ref);
        changed
    }
}

// ── Elements ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateElementRequest {
    pub kind: ElementKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl CreateElementRequest {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn autonomous_system(spec: &AutonomousSystemSpec) -> Self {
        let mut request = Self::new(ElementKind::AutonomousSystem, spec.name.clone());
        request
            .attributes
            .insert("as_number".into(), Value::String(spec.as_number.clone()));
        if let Some(comment) = &spec.comment {
            request
                .attributes
                .insert("comment".into(), Value::String(comment.clone()));
        }
        request
    }

    pub fn bgp_peering(name: &str) -> Self {
        Self::new(ElementKind::BgpPeering, name)
    }

    pub fn zone(name: &str) -> Self {
        Self::new(ElementKind::Zone, name)
    }
}

// ── Routing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachPeeringRequest {
    /// Routing id of the interface, `"1"` or `"2.3"`.
    pub interface_id: String,
    /// Restrict the attachment to one network of the interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub peering: Handle,
    pub next_hop: Handle,
}
