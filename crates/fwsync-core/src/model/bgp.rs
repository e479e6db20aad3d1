// ── Desired BGP configuration ──
//
// Announced and antispoofing networks are written as maps keyed by
// element type, so they are read as loose JSON values and shape-checked
// here before anything is resolved.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::desired::lenient;
use super::handle::{ElementKind, ElementRef};
use crate::error::ValidationError;

// ── Raw input ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBgp {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub router_id: Option<String>,
    #[serde(default)]
    pub bgp_profile: Option<String>,
    #[serde(default)]
    pub autonomous_system: Option<RawAutonomousSystem>,
    #[serde(default)]
    pub announced_network: Vec<IndexMap<String, Value>>,
    #[serde(default)]
    pub antispoofing_network: IndexMap<String, Value>,
    #[serde(default)]
    pub bgp_peering: Vec<RawPeering>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAutonomousSystem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub as_number: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPeering {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub external_bgp_peer: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub interface_id: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

// ── Specs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutonomousSystemSpec {
    pub name: String,
    pub as_number: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnouncedNetworkSpec {
    pub network: ElementRef,
    pub route_map: Option<String>,
}

impl AnnouncedNetworkSpec {
    pub fn route_map_ref(&self) -> Option<ElementRef> {
        self.route_map
            .as_ref()
            .map(|name| ElementRef::new(ElementKind::RouteMap, name.clone()))
    }
}

/// The element a peering forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHop {
    ExternalBgpPeer(String),
    Engine(String),
}

impl NextHop {
    pub fn element_ref(&self) -> ElementRef {
        match self {
            Self::ExternalBgpPeer(name) => ElementRef::new(ElementKind::ExternalBgpPeer, name.clone()),
            Self::Engine(name) => ElementRef::new(ElementKind::Engine, name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeeringSpec {
    pub name: String,
    pub next_hop: NextHop,
    pub interface_id: String,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BgpSpec {
    pub enabled: bool,
    pub router_id: Option<String>,
    pub bgp_profile: Option<String>,
    pub autonomous_system: AutonomousSystemSpec,
    pub announced: Vec<AnnouncedNetworkSpec>,
    pub antispoofing: Vec<ElementRef>,
    pub peerings: Vec<PeeringSpec>,
}

impl BgpSpec {
    /// Shape-check a raw block. A disabled block carries only the flag.
    pub fn from_raw(raw: RawBgp) -> Result<Self, ValidationError> {
        let enabled = raw.enabled.unwrap_or(true);
        if !enabled {
            return Ok(Self::default());
        }

        let autonomous_system = parse_autonomous_system(raw.autonomous_system)?;
        let antispoofing = parse_antispoofing(&raw.antispoofing_network)?;
        let announced = parse_announced(&raw.announced_network)?;
        let peerings = raw
            .bgp_peering
            .into_iter()
            .enumerate()
            .map(|(index, peering)| parse_peering(peering, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enabled,
            router_id: raw.router_id,
            bgp_profile: raw.bgp_profile,
            autonomous_system,
            announced,
            antispoofing,
            peerings,
        })
    }

    /// Every named element the block depends on, deduplicated in order.
    pub fn references(&self) -> Vec<ElementRef> {
        let mut refs: Vec<ElementRef> = Vec::new();
        let mut add = |r: ElementRef| {
            if !refs.contains(&r) {
                refs.push(r);
            }
        };
        for network in &self.antispoofing {
            add(network.clone());
        }
        for announced in &self.announced {
            add(announced.network.clone());
            if let Some(route_map) = announced.route_map_ref() {
                add(route_map);
            }
        }
        if let Some(profile) = &self.bgp_profile {
            add(ElementRef::new(ElementKind::BgpProfile, profile.clone()));
        }
        for peering in &self.peerings {
            add(peering.next_hop.element_ref());
        }
        refs
    }
}

// ── Shape checks ────────────────────────────────────────────────────

fn network_kind(field: &str, key: &str) -> Result<ElementKind, ValidationError> {
    key.parse::<ElementKind>()
        .ok()
        .filter(|kind| kind.is_network_like())
        .ok_or_else(|| {
            ValidationError::invalid(
                field,
                format!("'{key}' is not one of: network, group, host"),
            )
        })
}

fn parse_autonomous_system(
    raw: Option<RawAutonomousSystem>,
) -> Result<AutonomousSystemSpec, ValidationError> {
    let raw = raw.ok_or_else(|| ValidationError::missing("autonomous_system", "bgp"))?;
    let name = raw
        .name
        .ok_or_else(|| ValidationError::missing("name", "bgp.autonomous_system"))?;
    let as_number = raw
        .as_number
        .ok_or_else(|| ValidationError::missing("as_number", "bgp.autonomous_system"))?;
    Ok(AutonomousSystemSpec {
        name,
        as_number,
        comment: raw.comment,
    })
}

fn parse_antispoofing(raw: &IndexMap<String, Value>) -> Result<Vec<ElementRef>, ValidationError> {
    let mut refs = Vec::new();
    for (key, values) in raw {
        let kind = network_kind("antispoofing_network", key)?;
        let Value::Array(names) = values else {
            return Err(ValidationError::invalid(
                "antispoofing_network",
                format!("'{key}' must be a list of element names"),
            ));
        };
        for name in names {
            let name = scalar_name(name).ok_or_else(|| {
                ValidationError::invalid(
                    "antispoofing_network",
                    format!("'{key}' entries must be element names"),
                )
            })?;
            refs.push(ElementRef::new(kind, name));
        }
    }
    Ok(refs)
}

fn parse_announced(
    raw: &[IndexMap<String, Value>],
) -> Result<Vec<AnnouncedNetworkSpec>, ValidationError> {
    let mut announced: Vec<AnnouncedNetworkSpec> = Vec::new();
    for entry in raw {
        for (key, value) in entry {
            let kind = network_kind("announced_network", key)?;
            let shape_error = || {
                ValidationError::invalid(
                    "announced_network",
                    format!("'{key}' must be defined with a name and optional route_map"),
                )
            };
            let Value::Object(fields) = value else {
                return Err(shape_error());
            };
            let name = fields.get("name").and_then(scalar_name).ok_or_else(shape_error)?;
            let route_map = match fields.get("route_map") {
                None | Some(Value::Null) => None,
                Some(value) => Some(scalar_name(value).ok_or_else(shape_error)?),
            };
            let network = ElementRef::new(kind, name);
            if announced.iter().any(|a| a.network == network) {
                return Err(ValidationError::Duplicate {
                    what: "announced network".into(),
                    value: network.to_string(),
                    context: "bgp".into(),
                });
            }
            announced.push(AnnouncedNetworkSpec { network, route_map });
        }
    }
    Ok(announced)
}

fn parse_peering(raw: RawPeering, index: usize) -> Result<PeeringSpec, ValidationError> {
    let context = format!("bgp_peering #{}", index + 1);
    let name = raw
        .name
        .ok_or_else(|| ValidationError::missing("name", context.clone()))?;
    let interface_id = raw
        .interface_id
        .ok_or_else(|| ValidationError::missing("interface_id", context.clone()))?;
    let next_hop = match (raw.external_bgp_peer, raw.engine) {
        (Some(peer), None) => NextHop::ExternalBgpPeer(peer),
        (None, Some(engine)) => NextHop::Engine(engine),
        (None, None) => {
            return Err(ValidationError::missing("external_bgp_peer or engine", context));
        }
        (Some(_), Some(_)) => {
            return Err(ValidationError::invalid(
                "bgp_peering",
                format!("{context} declares both external_bgp_peer and engine"),
            ));
        }
    };
    Ok(PeeringSpec {
        name,
        next_hop,
        interface_id,
        network: raw.network,
    })
}

fn scalar_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(yaml: &str) -> Result<BgpSpec, ValidationError> {
        BgpSpec::from_raw(serde_yaml::from_str(yaml).unwrap())
    }

    const FULL: &str = r"
router_id: 1.1.1.1
bgp_profile: Default BGP Profile
autonomous_system: {name: as-200, as_number: 200, comment: mine}
announced_network:
  - network: {name: net-172, route_map: myroutemap}
  - host: {name: hostb}
antispoofing_network:
  network: [net-a]
  host: [hostb]
bgp_peering:
  - {name: peer-1, external_bgp_peer: extpeer, interface_id: 1}
  - {name: peer-2, engine: sg_vm, interface_id: 2.3, network: 3.3.3.0/24}
";

    #[test]
    fn full_block_parses() {
        let spec = parse(FULL).unwrap();
        assert!(spec.enabled);
        assert_eq!(spec.autonomous_system.as_number, "200");
        assert_eq!(spec.announced.len(), 2);
        assert_eq!(spec.announced[0].route_map.as_deref(), Some("myroutemap"));
        assert_eq!(spec.antispoofing.len(), 2);
        assert_eq!(spec.peerings[1].interface_id, "2.3");
        assert_eq!(spec.peerings[1].next_hop, NextHop::Engine("sg_vm".into()));
    }

    #[test]
    fn references_cover_every_dependency() {
        let refs: Vec<String> = parse(FULL)
            .unwrap()
            .references()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            refs,
            vec![
                "network 'net-a'",
                "host 'hostb'",
                "network 'net-172'",
                "route_map 'myroutemap'",
                "bgp_profile 'Default BGP Profile'",
                "external_bgp_peer 'extpeer'",
                "engine 'sg_vm'",
            ]
        );
    }

    #[test]
    fn disabled_block_skips_shape_checks() {
        let spec = parse("enabled: false\nannounced_network: [{bogus: 1}]\n").unwrap();
        assert!(!spec.enabled);
        assert!(spec.references().is_empty());
    }

    #[test]
    fn autonomous_system_fields_are_required() {
        let err = parse("autonomous_system: {name: as-1}\n").unwrap_err();
        assert_eq!(
            err,
            ValidationError::missing("as_number", "bgp.autonomous_system")
        );
    }

    #[test]
    fn unknown_network_type_is_rejected() {
        let err = parse(
            "autonomous_system: {name: a, as_number: 1}\nantispoofing_network: {router: [r1]}\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'router' is not one of"));
    }

    #[test]
    fn announced_entries_need_a_name() {
        let err = parse(
            "autonomous_system: {name: a, as_number: 1}\nannounced_network: [{network: net-a}]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be defined with a name"));
    }

    #[test]
    fn duplicate_announced_network_is_rejected() {
        let err = parse(
            r"
autonomous_system: {name: a, as_number: 1}
announced_network:
  - network: {name: net-a}
  - network: {name: net-a, route_map: rm}
",
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { .. }));
    }

    #[test]
    fn peering_needs_exactly_one_next_hop() {
        let base = "autonomous_system: {name: a, as_number: 1}\n";
        let none = format!("{base}bgp_peering: [{{name: p, interface_id: 1}}]\n");
        assert!(matches!(
            parse(&none).unwrap_err(),
            ValidationError::MissingField { .. }
        ));
        let both = format!(
            "{base}bgp_peering: [{{name: p, interface_id: 1, engine: e, external_bgp_peer: x}}]\n"
        );
        assert!(matches!(
            parse(&both).unwrap_err(),
            ValidationError::InvalidValue { .. }
        ));
    }
}
