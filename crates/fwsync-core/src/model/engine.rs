// ── Engine state ──
//
// The full engine document as held by the management service. The
// settings block doubles as the mutable draft that reconcilers edit
// locally before one update-engine call persists it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::handle::Handle;
use super::interface::RemoteInterface;
use super::routing::RoutingNode;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClusterMode {
    Balancing,
    #[default]
    Standby,
}

/// Engine-wide boolean features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    DefaultNat,
    FileReputation,
    Antivirus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub nodeid: u8,
    pub name: String,
}

/// Management and heartbeat interface selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceOptions {
    pub primary_mgt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_mgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_heartbeat: Option<String>,
}

// ── SNMP ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnmpSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl SnmpSettings {
    /// Enable with a full configuration, replacing whatever was set.
    pub fn enable(&mut self, agent: String, location: Option<String>, interfaces: Vec<String>) {
        self.enabled = true;
        self.agent = Some(agent);
        self.location = location;
        self.interfaces = interfaces;
    }

    pub fn disable(&mut self) {
        *self = Self::default();
    }
}

// ── BGP ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncedNetwork {
    pub network: Handle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_map: Option<Handle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomous_system: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub antispoofing: Vec<Handle>,
    #[serde(default)]
    pub announced: Vec<AnnouncedNetwork>,
}

impl BgpSettings {
    /// Enable BGP. Announced networks start empty and are re-advertised
    /// afterwards.
    pub fn enable(
        &mut self,
        autonomous_system: Handle,
        antispoofing: Vec<Handle>,
        router_id: Option<String>,
        profile: Option<String>,
    ) {
        *self = Self {
            enabled: true,
            autonomous_system: Some(autonomous_system),
            router_id,
            profile,
            antispoofing,
            announced: Vec::new(),
        };
    }

    pub fn disable(&mut self) {
        *self = Self::default();
    }

    /// Announce a network, replacing the route map of an existing entry.
    pub fn advertise_network(&mut self, network: AnnouncedNetwork) {
        match self.announced.iter_mut().find(|a| a.network == network.network) {
            Some(existing) => existing.route_map = network.route_map,
            None => self.announced.push(network),
        }
    }
}

// ── Settings & engine ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub cluster_mode: ClusterMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub default_nat: bool,
    #[serde(default)]
    pub file_reputation: bool,
    #[serde(default)]
    pub antivirus: bool,
    #[serde(default)]
    pub domain_server_address: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_server: Option<Handle>,
    #[serde(default)]
    pub snmp: SnmpSettings,
    #[serde(default)]
    pub bgp: BgpSettings,
}

impl EngineSettings {
    pub fn feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::DefaultNat => self.default_nat,
            Feature::FileReputation => self.file_reputation,
            Feature::Antivirus => self.antivirus,
        }
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::DefaultNat => self.default_nat = enabled,
            Feature::FileReputation => self.file_reputation = enabled,
            Feature::Antivirus => self.antivirus = enabled,
        }
    }

    pub fn clear_dns(&mut self) {
        self.domain_server_address.clear();
    }

    pub fn add_dns(&mut self, servers: &[String]) {
        self.domain_server_address.extend(servers.iter().cloned());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<ClusterNode>,
    #[serde(default)]
    pub settings: EngineSettings,
    #[serde(default)]
    pub interface_options: InterfaceOptions,
    #[serde(default)]
    pub interfaces: Vec<RemoteInterface>,
    #[serde(default)]
    pub routing: Vec<RoutingNode>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EngineState {
    pub fn cluster_size(&self) -> usize {
        self.nodes.len()
    }

    pub fn interface(&self, interface_id: &str) -> Option<&RemoteInterface> {
        self.interfaces
            .iter()
            .find(|i| i.interface_id == interface_id)
    }

    pub fn interface_mut(&mut self, interface_id: &str) -> Option<&mut RemoteInterface> {
        self.interfaces
            .iter_mut()
            .find(|i| i.interface_id == interface_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_resets_announced_networks() {
        let mut bgp = BgpSettings::default();
        bgp.advertise_network(AnnouncedNetwork {
            network: Handle::new("elements/network/1"),
            route_map: None,
        });
        bgp.enable(Handle::new("elements/autonomous_system/1"), vec![], Some("1.1.1.1".into()), None);
        assert!(bgp.enabled);
        assert!(bgp.announced.is_empty());
    }

    #[test]
    fn advertise_replaces_route_map() {
        let mut bgp = BgpSettings::default();
        let network = Handle::new("elements/network/1");
        bgp.advertise_network(AnnouncedNetwork {
            network: network.clone(),
            route_map: None,
        });
        bgp.advertise_network(AnnouncedNetwork {
            network,
            route_map: Some(Handle::new("elements/route_map/1")),
        });
        assert_eq!(bgp.announced.len(), 1);
        assert!(bgp.announced[0].route_map.is_some());
    }

    #[test]
    fn features_toggle_independently() {
        let mut settings = EngineSettings::default();
        settings.set_feature(Feature::Antivirus, true);
        assert!(settings.feature(Feature::Antivirus));
        assert!(!settings.feature(Feature::DefaultNat));
    }

    #[test]
    fn cluster_mode_parses_lowercase() {
        assert_eq!("balancing".parse::<ClusterMode>().ok(), Some(ClusterMode::Balancing));
        assert_eq!(ClusterMode::default().to_string(), "standby");
    }
}
