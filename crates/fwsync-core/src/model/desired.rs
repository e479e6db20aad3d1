// ── Desired interface model ──
//
// Typed interface/VLAN/node specifications parsed from the raw
// `interfaces` list of a desired document, grouped by interface id.
// Pure data, no I/O.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::handle::MacAddress;
use super::interface::CviMode;
use crate::error::ValidationError;

// ── Lenient scalars ─────────────────────────────────────────────────

/// Desired documents spell ids as either integers or strings.
pub(crate) mod lenient {
    use super::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Bool(bool),
        Str(String),
    }

    impl From<Scalar> for String {
        fn from(scalar: Scalar) -> Self {
            match scalar {
                Scalar::Int(n) => n.to_string(),
                Scalar::Float(f) => f.to_string(),
                Scalar::Bool(b) => b.to_string(),
                Scalar::Str(s) => s,
            }
        }
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Option::<Vec<Scalar>>::deserialize(deserializer)?;
        Ok(values
            .unwrap_or_default()
            .into_iter()
            .map(String::from)
            .collect())
    }
}

// ── Raw input ───────────────────────────────────────────────────────

/// One entry of the `interfaces` list, as written by the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInterface {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub interface_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub vlan_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cluster_virtual: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub network_value: Option<String>,
    #[serde(default)]
    pub macaddress: Option<String>,
    #[serde(default)]
    pub zone_ref: Option<String>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub network_value: Option<String>,
    #[serde(default)]
    pub nodeid: Option<i64>,
}

// ── Specs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub address: String,
    pub network_value: String,
    pub nodeid: u8,
}

/// A validated interface or VLAN declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub interface_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_virtual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvi_mode: Option<CviMode>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl InterfaceSpec {
    /// Validate one raw entry. `index` locates entries that lack an id.
    pub fn from_raw(raw: RawInterface, index: usize) -> Result<Self, ValidationError> {
        let interface_id = raw.interface_id.ok_or_else(|| {
            ValidationError::missing("interface_id", format!("interface definition #{}", index + 1))
        })?;
        let context = describe(&interface_id, raw.vlan_id.as_deref());

        if raw.cluster_virtual.is_some() && raw.network_value.is_none() {
            return Err(ValidationError::missing("network_value", context));
        }

        let mut nodes: Vec<NodeSpec> = Vec::with_capacity(raw.nodes.len());
        for node in raw.nodes {
            let address = node
                .address
                .ok_or_else(|| ValidationError::missing("address", context.clone()))?;
            let network_value = node
                .network_value
                .ok_or_else(|| ValidationError::missing("network_value", context.clone()))?;
            let raw_id = node
                .nodeid
                .ok_or_else(|| ValidationError::missing("nodeid", context.clone()))?;
            let nodeid = u8::try_from(raw_id)
                .ok()
                .filter(|id| *id >= 1)
                .ok_or_else(|| {
                    ValidationError::invalid("nodeid", format!("{raw_id} is not a valid node id in {context}"))
                })?;
            if nodes.iter().any(|n| n.nodeid == nodeid) {
                return Err(ValidationError::Duplicate {
                    what: "nodeid".into(),
                    value: nodeid.to_string(),
                    context,
                });
            }
            nodes.push(NodeSpec {
                address,
                network_value,
                nodeid,
            });
        }

        let cvi_mode = raw
            .cluster_virtual
            .as_ref()
            .map(|_| CviMode::PacketDispatch);

        Ok(Self {
            interface_id,
            vlan_id: raw.vlan_id,
            cluster_virtual: raw.cluster_virtual,
            network_value: raw.network_value,
            macaddress: raw.macaddress.map(MacAddress::new),
            zone_ref: raw.zone_ref,
            cvi_mode,
            nodes,
        })
    }

    pub fn is_vlan(&self) -> bool {
        self.vlan_id.is_some()
    }

    /// CVI address and mask, when both are declared.
    pub fn cvi(&self) -> Option<(&str, &str)> {
        match (self.cluster_virtual.as_deref(), self.network_value.as_deref()) {
            (Some(cvi), Some(mask)) => Some((cvi, mask)),
            _ => None,
        }
    }

    /// Declares any address at all (CVI or node).
    pub fn has_addresses(&self) -> bool {
        self.cvi().is_some() || !self.nodes.is_empty()
    }

    /// A flat interface is creatable with CVI+mask+MAC or at least one node.
    pub fn is_creatable(&self) -> bool {
        (self.cvi().is_some() && self.macaddress.is_some()) || !self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, nodeid: u8) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.nodeid == nodeid)
    }

    /// Id used by the routing table: `"{interface_id}.{vlan_id}"` for VLANs.
    pub fn routing_id(&self) -> String {
        match &self.vlan_id {
            Some(vlan) => format!("{}.{vlan}", self.interface_id),
            None => self.interface_id.clone(),
        }
    }

    /// Flat attribute map passed to engine creation; absent keys omitted.
    pub fn to_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

impl fmt::Display for InterfaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(&self.interface_id, self.vlan_id.as_deref()))
    }
}

fn describe(interface_id: &str, vlan_id: Option<&str>) -> String {
    match vlan_id {
        Some(vlan) => format!("interface {interface_id} (vlan {vlan})"),
        None => format!("interface {interface_id}"),
    }
}

// ── Groups ──────────────────────────────────────────────────────────

/// Every spec sharing one `interface_id`: an optional base entry plus
/// VLAN entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceGroup {
    interface_id: String,
    specs: Vec<InterfaceSpec>,
}

impl InterfaceGroup {
    fn new(interface_id: String) -> Self {
        Self {
            interface_id,
            specs: Vec::new(),
        }
    }

    fn push(&mut self, spec: InterfaceSpec) -> Result<(), ValidationError> {
        let context = format!("interface {}", self.interface_id);
        match &spec.vlan_id {
            Some(vlan) if self.vlan(vlan).is_some() => {
                return Err(ValidationError::Duplicate {
                    what: "vlan_id".into(),
                    value: vlan.clone(),
                    context,
                });
            }
            None if self.base().is_some() => {
                return Err(ValidationError::Duplicate {
                    what: "interface definition".into(),
                    value: self.interface_id.clone(),
                    context,
                });
            }
            _ => {}
        }
        self.specs.push(spec);

        let base_has_addresses = self.base().is_some_and(InterfaceSpec::has_addresses);
        if base_has_addresses && self.has_vlans() {
            return Err(ValidationError::invalid(
                "interfaces",
                format!(
                    "{context} declares addresses on the base interface and VLAN sub-interfaces"
                ),
            ));
        }
        Ok(())
    }

    pub fn interface_id(&self) -> &str {
        &self.interface_id
    }

    pub fn specs(&self) -> &[InterfaceSpec] {
        &self.specs
    }

    /// The non-VLAN entry, if declared.
    pub fn base(&self) -> Option<&InterfaceSpec> {
        self.specs.iter().find(|s| !s.is_vlan())
    }

    pub fn vlan(&self, vlan_id: &str) -> Option<&InterfaceSpec> {
        self.specs
            .iter()
            .find(|s| s.vlan_id.as_deref() == Some(vlan_id))
    }

    pub fn vlans(&self) -> impl Iterator<Item = &InterfaceSpec> {
        self.specs.iter().filter(|s| s.is_vlan())
    }

    pub fn vlan_ids(&self) -> Vec<&str> {
        self.specs.iter().filter_map(|s| s.vlan_id.as_deref()).collect()
    }

    pub fn has_vlans(&self) -> bool {
        self.specs.iter().any(InterfaceSpec::is_vlan)
    }
}

/// Desired interfaces grouped by id, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceGroups {
    groups: IndexMap<String, InterfaceGroup>,
}

impl InterfaceGroups {
    pub fn from_raw(raw: Vec<RawInterface>) -> Result<Self, ValidationError> {
        let mut groups: IndexMap<String, InterfaceGroup> = IndexMap::new();
        for (index, entry) in raw.into_iter().enumerate() {
            let spec = InterfaceSpec::from_raw(entry, index)?;
            groups
                .entry(spec.interface_id.clone())
                .or_insert_with(|| InterfaceGroup::new(spec.interface_id.clone()))
                .push(spec)?;
        }
        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, interface_id: &str) -> Option<&InterfaceGroup> {
        self.groups.get(interface_id)
    }

    pub fn contains(&self, interface_id: &str) -> bool {
        self.groups.contains_key(interface_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceGroup> {
        self.groups.values()
    }

    /// Every spec across all groups, in declaration order per group.
    pub fn specs(&self) -> impl Iterator<Item = &InterfaceSpec> {
        self.groups.values().flat_map(|g| g.specs.iter())
    }

    /// Look up a base interface (`"1"`) or a VLAN (`"2.3"`).
    pub fn find(&self, id: &str) -> Option<&InterfaceSpec> {
        if let Some(group) = self.get(id) {
            return group.base();
        }
        let (interface_id, vlan_id) = id.split_once('.')?;
        self.get(interface_id)?.vlan(vlan_id)
    }

    /// Every node id must address an existing cluster member.
    pub fn validate_cluster_size(&self, cluster_size: usize) -> Result<(), ValidationError> {
        for spec in self.specs() {
            if let Some(node) = spec
                .nodes
                .iter()
                .find(|n| usize::from(n.nodeid) > cluster_size)
            {
                return Err(ValidationError::invalid(
                    "nodeid",
                    format!(
                        "node {} on {spec} exceeds the cluster size of {cluster_size}",
                        node.nodeid
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Result<InterfaceGroups, ValidationError> {
        let raw: Vec<RawInterface> = serde_yaml::from_str(yaml).unwrap();
        InterfaceGroups::from_raw(raw)
    }

    const TWO_NODE: &str = r"
- interface_id: 0
  cluster_virtual: 1.1.1.1
  network_value: 1.1.1.0/24
  macaddress: 02-02-02-02-02-02
  nodes:
    - {address: 1.1.1.2, network_value: 1.1.1.0/24, nodeid: 1}
    - {address: 1.1.1.3, network_value: 1.1.1.0/24, nodeid: 2}
- interface_id: 2
  vlan_id: 3
  nodes:
    - {address: 3.3.3.2, network_value: 3.3.3.0/24, nodeid: 1}
- interface_id: '2'
  vlan_id: '4'
";

    #[test]
    fn groups_by_interface_id_in_order() {
        let groups = parse(TWO_NODE).unwrap();
        let ids: Vec<&str> = groups.iter().map(InterfaceGroup::interface_id).collect();
        assert_eq!(ids, vec!["0", "2"]);

        let vlans = groups.get("2").unwrap();
        assert_eq!(vlans.vlan_ids(), vec!["3", "4"]);
        assert!(vlans.base().is_none());
        assert_eq!(vlans.vlan("3").unwrap().node_count(), 1);
    }

    #[test]
    fn cvi_derives_dispatch_mode_and_normalizes_mac() {
        let groups = parse(TWO_NODE).unwrap();
        let mgmt = groups.find("0").unwrap();
        assert_eq!(mgmt.cvi_mode, Some(CviMode::PacketDispatch));
        assert_eq!(mgmt.macaddress.as_ref().unwrap().as_str(), "02:02:02:02:02:02");
        assert!(mgmt.is_creatable());
    }

    #[test]
    fn find_resolves_vlan_ids() {
        let groups = parse(TWO_NODE).unwrap();
        assert_eq!(groups.find("2.4").unwrap().routing_id(), "2.4");
        assert!(groups.find("2").is_none());
        assert!(groups.find("9.9").is_none());
    }

    #[test]
    fn duplicate_nodeid_is_rejected() {
        let err = parse(
            r"
- interface_id: 1
  nodes:
    - {address: 1.1.1.2, network_value: 1.1.1.0/24, nodeid: 1}
    - {address: 1.1.1.3, network_value: 1.1.1.0/24, nodeid: 1}
",
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Duplicate {
                what: "nodeid".into(),
                value: "1".into(),
                context: "interface 1".into(),
            }
        );
    }

    #[test]
    fn missing_interface_id_names_position() {
        let err = parse("- {vlan_id: 3}\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required field 'interface_id' in interface definition #1"
        );
    }

    #[test]
    fn node_fields_are_mandatory() {
        let err = parse(
            r"
- interface_id: 1
  vlan_id: 5
  nodes:
    - {address: 1.1.1.2, nodeid: 1}
",
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::missing("network_value", "interface 1 (vlan 5)")
        );
    }

    #[test]
    fn cvi_requires_network_value() {
        let err = parse("- {interface_id: 1, cluster_virtual: 1.1.1.1}\n").unwrap_err();
        assert_eq!(err, ValidationError::missing("network_value", "interface 1"));
    }

    #[test]
    fn duplicate_vlan_is_rejected() {
        let err = parse("- {interface_id: 2, vlan_id: 3}\n- {interface_id: 2, vlan_id: 3}\n")
            .unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { ref what, .. } if what == "vlan_id"));
    }

    #[test]
    fn base_addresses_and_vlans_are_exclusive() {
        let err = parse(
            r"
- interface_id: 2
  nodes:
    - {address: 1.1.1.2, network_value: 1.1.1.0/24, nodeid: 1}
- interface_id: 2
  vlan_id: 3
",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn attributes_omit_absent_keys() {
        let groups = parse(TWO_NODE).unwrap();
        let attrs = groups.find("2.4").unwrap().to_attributes();
        assert_eq!(attrs.get("vlan_id").unwrap(), "4");
        assert!(!attrs.contains_key("cluster_virtual"));

        let base = groups.find("0").unwrap().to_attributes();
        assert!(!base.contains_key("vlan_id"));
        assert_eq!(base.get("cvi_mode").unwrap(), "packetdispatch");
    }

    #[test]
    fn cluster_size_bounds_nodeids() {
        let groups = parse(TWO_NODE).unwrap();
        assert!(groups.validate_cluster_size(2).is_ok());
        let err = groups.validate_cluster_size(1).unwrap_err();
        assert!(err.to_string().contains("exceeds the cluster size of 1"));
    }
}
