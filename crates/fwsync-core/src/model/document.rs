// ── Desired cluster document ──
//
// The user-facing document (YAML or JSON) and its validated form.
// Validation runs in full before any remote call is made.

use serde::{Deserialize, Serialize};

use super::bgp::{BgpSpec, RawBgp};
use super::desired::{InterfaceGroups, RawInterface, lenient};
use super::engine::{ClusterMode, InterfaceOptions};
use super::handle::{ElementKind, ElementRef};
use crate::error::{ReconcileError, ValidationError};

/// Whether the engine should exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

// ── Raw document ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterDocument {
    pub name: String,
    #[serde(default)]
    pub cluster_mode: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<RawInterface>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub primary_mgt: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub backup_mgt: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub primary_heartbeat: Option<String>,
    #[serde(default)]
    pub default_nat: Option<bool>,
    #[serde(default)]
    pub antivirus: Option<bool>,
    #[serde(default)]
    pub file_reputation: Option<bool>,
    #[serde(default)]
    pub domain_server_address: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Name of the log server the engine sends logs to.
    #[serde(default)]
    pub log_server: Option<String>,
    #[serde(default)]
    pub snmp: Option<RawSnmp>,
    #[serde(default)]
    pub bgp: Option<RawBgp>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub skip_interfaces: bool,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSnmp {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub snmp_agent: Option<String>,
    #[serde(default)]
    pub snmp_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub snmp_interface: Vec<String>,
}

impl ClusterDocument {
    pub fn from_yaml(input: &str) -> Result<Self, ReconcileError> {
        serde_yaml::from_str(input).map_err(|e| ReconcileError::Document(e.to_string()))
    }

    pub fn from_json(input: &str) -> Result<Self, ReconcileError> {
        serde_json::from_str(input).map_err(|e| ReconcileError::Document(e.to_string()))
    }
}

// ── Validated document ──────────────────────────────────────────────

/// Engine-wide settings; `None` leaves the live value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneralSpec {
    pub cluster_mode: ClusterMode,
    pub default_nat: Option<bool>,
    pub antivirus: Option<bool>,
    pub file_reputation: Option<bool>,
    pub domain_server_address: Option<Vec<String>>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnmpSpec {
    pub enabled: bool,
    pub agent: String,
    pub location: Option<String>,
    pub interfaces: Vec<String>,
}

impl SnmpSpec {
    fn from_raw(raw: RawSnmp) -> Result<Self, ValidationError> {
        let enabled = raw.enabled.unwrap_or(true);
        let agent = match raw.snmp_agent {
            Some(agent) => agent,
            None if enabled => return Err(ValidationError::missing("snmp_agent", "snmp")),
            None => String::new(),
        };
        Ok(Self {
            enabled,
            agent,
            location: raw.snmp_location,
            interfaces: raw.snmp_interface,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredCluster {
    pub name: String,
    pub state: DesiredState,
    pub comment: Option<String>,
    pub log_server: Option<String>,
    pub general: GeneralSpec,
    pub management: InterfaceOptions,
    pub interfaces: InterfaceGroups,
    pub snmp: Option<SnmpSpec>,
    pub bgp: Option<BgpSpec>,
    pub tags: Vec<String>,
    pub skip_interfaces: bool,
}

impl DesiredCluster {
    pub fn from_document(doc: ClusterDocument) -> Result<Self, ValidationError> {
        if doc.name.trim().is_empty() {
            return Err(ValidationError::missing("name", "document"));
        }
        let cluster_mode = match doc.cluster_mode.as_deref() {
            None => ClusterMode::default(),
            Some(mode) => mode.parse().map_err(|_| {
                ValidationError::invalid(
                    "cluster_mode",
                    format!("'{mode}' is not one of: balancing, standby"),
                )
            })?,
        };
        let state = match doc.state.as_deref() {
            None | Some("present") => DesiredState::Present,
            Some("absent") => DesiredState::Absent,
            Some(other) => {
                return Err(ValidationError::invalid(
                    "state",
                    format!("'{other}' is not one of: present, absent"),
                ));
            }
        };

        let interfaces = InterfaceGroups::from_raw(doc.interfaces)?;
        let snmp = doc.snmp.map(SnmpSpec::from_raw).transpose()?;
        let bgp = doc.bgp.map(BgpSpec::from_raw).transpose()?;

        Ok(Self {
            name: doc.name,
            state,
            comment: doc.comment,
            log_server: doc.log_server,
            general: GeneralSpec {
                cluster_mode,
                default_nat: doc.default_nat,
                antivirus: doc.antivirus,
                file_reputation: doc.file_reputation,
                domain_server_address: doc.domain_server_address,
                location: doc.location,
            },
            management: InterfaceOptions {
                primary_mgt: doc.primary_mgt.unwrap_or_else(|| "0".into()),
                backup_mgt: doc.backup_mgt,
                primary_heartbeat: doc.primary_heartbeat,
            },
            interfaces,
            snmp,
            bgp,
            tags: doc.tags,
            skip_interfaces: doc.skip_interfaces,
        })
    }

    /// Requirements for creating the engine. Returns the cluster size,
    /// taken from the node count of the primary management interface.
    pub fn validate_for_create(&self) -> Result<usize, ValidationError> {
        if self.interfaces.is_empty() {
            return Err(ValidationError::requirement(
                "at least one interface is required to create a cluster",
            ));
        }
        let primary = &self.management.primary_mgt;
        let mgmt = self.interfaces.find(primary).ok_or_else(|| {
            ValidationError::requirement(format!(
                "primary management interface {primary} is not defined"
            ))
        })?;
        let cluster_size = mgmt.node_count();
        if cluster_size == 0 {
            return Err(ValidationError::requirement(format!(
                "primary management {mgmt} must declare at least one node"
            )));
        }
        self.interfaces.validate_cluster_size(cluster_size)?;
        Ok(cluster_size)
    }

    /// Element references the run must resolve before mutating.
    pub fn references(&self) -> Vec<ElementRef> {
        if self.state == DesiredState::Absent {
            return Vec::new();
        }
        let mut refs = Vec::new();
        if let Some(log_server) = self.log_server_ref() {
            refs.push(log_server);
        }
        if let Some(bgp) = self.bgp.as_ref().filter(|b| b.enabled) {
            refs.extend(bgp.references());
        }
        refs
    }

    pub fn log_server_ref(&self) -> Option<ElementRef> {
        self.log_server
            .as_deref()
            .map(|name| ElementRef::new(ElementKind::LogServer, name))
    }
}
