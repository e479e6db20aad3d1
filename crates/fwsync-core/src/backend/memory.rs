// ── In-memory management service ──
//
// Holds engines and a catalogue of named elements, applies commands the
// way the service does, and re-derives the routing table after every
// interface change. Serializes to a JSON snapshot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Lookup, ManagementBackend};
use crate::command::{Command, CommandResult, CreateClusterRequest, CreateElementRequest};
use crate::error::RemoteError;
use crate::model::{
    AddressList, ClusterNode, ElementKind, EngineSettings, EngineState, FlatInterface, Handle,
    InterfaceKind, InterfaceSpec, PeeringAttachment, RemoteInterface, RoutingNetwork, RoutingNode,
    VlanCollection, VlanInterface,
};

/// A named element in the service catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredElement {
    pub kind: ElementKind,
    pub name: String,
    pub handle: Handle,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBackend {
    #[serde(default)]
    engines: IndexMap<String, EngineState>,
    #[serde(default)]
    elements: Vec<StoredElement>,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    history: Vec<Command>,
    #[serde(skip)]
    reject: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        let mut backend: Self = serde_json::from_str(input)?;
        for engine in backend.engines.values_mut() {
            sync_routing(engine);
        }
        Ok(backend)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    // ── Seeding & inspection ─────────────────────────────────────────

    pub fn insert_engine(&mut self, mut engine: EngineState) {
        sync_routing(&mut engine);
        self.engines.insert(engine.name.clone(), engine);
    }

    pub fn engine(&self, name: &str) -> Option<&EngineState> {
        self.engines.get(name)
    }

    pub fn engines(&self) -> impl Iterator<Item = &EngineState> {
        self.engines.values()
    }

    /// Register a named element and return its handle.
    pub fn add_element(&mut self, kind: ElementKind, name: &str) -> Handle {
        self.store_element(CreateElementRequest::new(kind, name))
    }

    pub fn elements(&self) -> &[StoredElement] {
        &self.elements
    }

    /// Commands applied so far, in order.
    pub fn history(&self) -> &[Command] {
        &self.history
    }

    /// Reject every later command with this name.
    pub fn fail_on(&mut self, command: &str) {
        self.reject = Some(command.to_owned());
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lookup_element(&self, kind: ElementKind, name: &str) -> Option<&StoredElement> {
        self.elements
            .iter()
            .find(|e| e.kind == kind && e.name == name)
    }

    fn store_element(&mut self, request: CreateElementRequest) -> Handle {
        self.next_id += 1;
        let handle = Handle::new(format!("elements/{}/{}", request.kind, self.next_id));
        self.elements.push(StoredElement {
            kind: request.kind,
            name: request.name,
            handle: handle.clone(),
            attributes: request.attributes,
        });
        handle
    }

    fn zone_for(&mut self, spec: &InterfaceSpec) -> Option<Handle> {
        let name = spec.zone_ref.as_deref()?;
        match self.lookup_element(ElementKind::Zone, name) {
            Some(zone) => Some(zone.handle.clone()),
            None => Some(self.add_element(ElementKind::Zone, name)),
        }
    }

    fn require(&mut self, engine: &str) -> Result<&mut EngineState, RemoteError> {
        self.engines
            .get_mut(engine)
            .ok_or_else(|| RemoteError::not_found("engine", engine))
    }

    fn require_ref(&self, engine: &str) -> Result<&EngineState, RemoteError> {
        self.engines
            .get(engine)
            .ok_or_else(|| RemoteError::not_found("engine", engine))
    }

    fn create_engine(&mut self, request: &CreateClusterRequest) -> Result<CommandResult, RemoteError> {
        if self.engines.contains_key(&request.name) {
            return Err(RemoteError::conflict("engine", &request.name));
        }
        let specs = request
            .interface_specs()
            .map_err(|e| rejected("create_engine", e.to_string()))?;

        let mut nodes = Vec::with_capacity(request.nodes);
        for id in 1..=request.nodes {
            let nodeid = u8::try_from(id)
                .map_err(|_| rejected("create_engine", format!("{id} nodes are not supported")))?;
            nodes.push(ClusterNode {
                nodeid,
                name: format!("{} node {nodeid}", request.name),
            });
        }

        let mut engine = EngineState {
            name: request.name.clone(),
            nodes,
            settings: EngineSettings {
                cluster_mode: request.cluster_mode,
                comment: request.comment.clone(),
                default_nat: request.default_nat,
                file_reputation: request.file_reputation,
                antivirus: request.antivirus,
                domain_server_address: request.domain_server_address.clone(),
                location: request.location.clone(),
                log_server: request.log_server.clone(),
                snmp: request.snmp.clone().unwrap_or_default(),
                bgp: Default::default(),
            },
            interface_options: request.interface_options.clone(),
            ..Default::default()
        };
        for spec in &specs {
            let zone = self.zone_for(spec);
            if spec.is_vlan() {
                add_vlan(&mut engine, spec, zone, true)?;
            } else {
                add_flat(&mut engine, spec, zone)?;
            }
        }

        self.insert_engine(engine);
        Ok(CommandResult::Created(Handle::new(format!(
            "engines/{}",
            request.name
        ))))
    }

    fn apply(&mut self, engine: &str, command: &Command) -> Result<CommandResult, RemoteError> {
        match command {
            // ── Engine ───────────────────────────────────────────────
            Command::CreateEngine(request) => self.create_engine(request),
            Command::DeleteEngine => {
                self.engines
                    .shift_remove(engine)
                    .ok_or_else(|| RemoteError::not_found("engine", engine))?;
                Ok(CommandResult::Ok)
            }
            Command::UpdateEngine(settings) => {
                let state = self.require(engine)?;
                if state.settings == **settings {
                    return Ok(CommandResult::Unchanged);
                }
                state.settings = (**settings).clone();
                Ok(CommandResult::Ok)
            }
            Command::SetInterfaceOptions(options) => {
                let state = self.require(engine)?;
                state.interface_options = options.clone();
                Ok(CommandResult::Ok)
            }

            // ── Interfaces ───────────────────────────────────────────
            Command::AddClusterVirtualInterface(spec) => {
                let zone = self.zone_for(spec);
                add_flat(self.require(engine)?, spec, zone)
            }
            Command::AddVlanInterface(spec) => {
                let zone = self.zone_for(spec);
                add_vlan(self.require(engine)?, spec, zone, true)
            }
            Command::AddIpAddressAndVlan(spec) => {
                let zone = self.zone_for(spec);
                add_vlan(self.require(engine)?, spec, zone, false)
            }
            Command::ChangeClusterInterface(request) => {
                let interface = require_interface(self.require(engine)?, &request.interface_id)?;
                if interface.as_vlans().is_some() {
                    return Err(rejected(
                        command.name(),
                        format!("interface {} carries VLANs", request.interface_id),
                    ));
                }
                if request.apply(interface) {
                    Ok(CommandResult::Ok)
                } else {
                    Ok(CommandResult::Unchanged)
                }
            }
            Command::ResetInterface { interface_id } => {
                require_interface(self.require(engine)?, interface_id)?.reset();
                Ok(CommandResult::Ok)
            }
            Command::UpdateInterface(interface) => {
                let slot = require_interface(self.require(engine)?, &interface.interface_id)?;
                *slot = (**interface).clone();
                Ok(CommandResult::Ok)
            }
            Command::DeleteInterface { interface_id } => {
                let state = self.require(engine)?;
                let before = state.interfaces.len();
                state.interfaces.retain(|i| &i.interface_id != interface_id);
                if state.interfaces.len() == before {
                    return Err(RemoteError::not_found("interface", interface_id));
                }
                Ok(CommandResult::Ok)
            }

            // ── Routing ──────────────────────────────────────────────
            Command::DeleteRoute { name } => {
                let state = self.require(engine)?;
                let before = state.routing.len();
                state.routing.retain(|n| &n.name != name);
                if state.routing.len() == before {
                    return Err(RemoteError::not_found("route", name));
                }
                Ok(CommandResult::Ok)
            }
            Command::DeleteRouteNetwork { name, network } => {
                let state = self.require(engine)?;
                let node = state
                    .routing
                    .iter_mut()
                    .find(|n| &n.name == name)
                    .ok_or_else(|| RemoteError::not_found("route", name))?;
                let index = node
                    .networks
                    .iter()
                    .position(|n| &n.network == network)
                    .ok_or_else(|| RemoteError::not_found("route network", format!("{name} / {network}")))?;
                node.networks.remove(index);
                Ok(CommandResult::Ok)
            }
            Command::AttachBgpPeering(request) => {
                let state = self.require(engine)?;
                let node = state
                    .routing
                    .iter_mut()
                    .find(|n| n.interface_id == request.interface_id)
                    .ok_or_else(|| RemoteError::not_found("routing node", &request.interface_id))?;
                let mut matched = false;
                for network in node
                    .networks
                    .iter_mut()
                    .filter(|n| request.network.as_deref().is_none_or(|want| n.network == want))
                {
                    matched = true;
                    if !network.peerings.iter().any(|p| p.peering == request.peering) {
                        network.peerings.push(PeeringAttachment {
                            peering: request.peering.clone(),
                            next_hop: request.next_hop.clone(),
                        });
                    }
                }
                if !matched {
                    return Err(RemoteError::not_found(
                        "routing network",
                        request.network.clone().unwrap_or_else(|| request.interface_id.clone()),
                    ));
                }
                Ok(CommandResult::Ok)
            }

            // ── Elements ─────────────────────────────────────────────
            Command::CreateElement(request) => {
                if self.lookup_element(request.kind, &request.name).is_some() {
                    return Err(RemoteError::conflict(request.kind.to_string(), &request.name));
                }
                Ok(CommandResult::Created(self.store_element(request.clone())))
            }

            // ── Tags ─────────────────────────────────────────────────
            Command::AddTag { name } => {
                let state = self.require(engine)?;
                if state.tags.contains(name) {
                    return Ok(CommandResult::Unchanged);
                }
                state.tags.push(name.clone());
                Ok(CommandResult::Ok)
            }
            Command::ClearTags => {
                self.require(engine)?.tags.clear();
                Ok(CommandResult::Ok)
            }
        }
    }
}

impl ManagementBackend for MemoryBackend {
    async fn fetch_engine(&self, name: &str) -> Result<Option<EngineState>, RemoteError> {
        Ok(self.engines.get(name).cloned())
    }

    async fn interface(
        &self,
        engine: &str,
        interface_id: &str,
    ) -> Result<Lookup<RemoteInterface>, RemoteError> {
        Ok(self
            .require_ref(engine)?
            .interface(interface_id)
            .cloned()
            .into())
    }

    async fn interfaces(&self, engine: &str) -> Result<Vec<RemoteInterface>, RemoteError> {
        Ok(self.require_ref(engine)?.interfaces.clone())
    }

    async fn routing(&self, engine: &str) -> Result<Vec<RoutingNode>, RemoteError> {
        Ok(self.require_ref(engine)?.routing.clone())
    }

    async fn resolve(&self, kind: ElementKind, name: &str) -> Result<Option<Handle>, RemoteError> {
        if let Some(element) = self.lookup_element(kind, name) {
            return Ok(Some(element.handle.clone()));
        }
        if kind == ElementKind::Engine && self.engines.contains_key(name) {
            return Ok(Some(Handle::new(format!("engines/{name}"))));
        }
        Ok(None)
    }

    async fn execute(
        &mut self,
        engine: &str,
        command: &Command,
    ) -> Result<CommandResult, RemoteError> {
        if self.reject.as_deref() == Some(command.name()) {
            return Err(rejected(command.name(), "rejected by management service"));
        }
        debug!(engine, command = command.name(), subject = %command.target(), "applying command");
        let result = self.apply(engine, command)?;
        if command.touches_interfaces() {
            if let Some(state) = self.engines.get_mut(engine) {
                sync_routing(state);
            }
        }
        self.history.push(command.clone());
        Ok(result)
    }
}

// ── Interface mutations ─────────────────────────────────────────────

fn rejected(operation: &str, message: impl Into<String>) -> RemoteError {
    RemoteError::Rejected {
        operation: operation.to_owned(),
        message: message.into(),
    }
}

fn require_interface<'a>(
    engine: &'a mut EngineState,
    interface_id: &str,
) -> Result<&'a mut RemoteInterface, RemoteError> {
    engine
        .interface_mut(interface_id)
        .ok_or_else(|| RemoteError::not_found("interface", interface_id))
}

fn add_flat(
    engine: &mut EngineState,
    spec: &InterfaceSpec,
    zone_ref: Option<Handle>,
) -> Result<CommandResult, RemoteError> {
    if spec.is_vlan() {
        return Err(rejected(
            "add_cluster_virtual_interface",
            format!("{spec} is a VLAN"),
        ));
    }
    let flat = FlatInterface::from_spec(spec);
    match engine.interface_mut(&spec.interface_id) {
        Some(interface) if interface.has_vlan() || interface.has_interfaces() => {
            return Err(RemoteError::conflict("interface", &spec.interface_id));
        }
        Some(interface) => {
            interface.kind = InterfaceKind::Flat(flat);
            interface.zone_ref = zone_ref;
        }
        None => engine.interfaces.push(RemoteInterface {
            interface_id: spec.interface_id.clone(),
            zone_ref,
            kind: InterfaceKind::Flat(flat),
        }),
    }
    Ok(CommandResult::Ok)
}

fn add_vlan(
    engine: &mut EngineState,
    spec: &InterfaceSpec,
    zone_ref: Option<Handle>,
    create_parent: bool,
) -> Result<CommandResult, RemoteError> {
    let Some(vlan_id) = spec.vlan_id.as_deref() else {
        return Err(rejected("add_vlan_interface", format!("{spec} has no vlan_id")));
    };
    let vlan = VlanInterface::from_spec(&spec.interface_id, spec, zone_ref);

    let Some(interface) = engine.interface_mut(&spec.interface_id) else {
        if !create_parent {
            return Err(RemoteError::not_found("interface", &spec.interface_id));
        }
        engine
            .interfaces
            .push(RemoteInterface::vlans(spec.interface_id.clone(), vec![vlan]));
        return Ok(CommandResult::Ok);
    };

    let has_addresses = interface.as_flat().is_some_and(AddressList::has_interfaces);
    if has_addresses {
        return Err(rejected(
            "add_vlan_interface",
            format!("interface {} has addresses and cannot carry VLANs", spec.interface_id),
        ));
    }
    match interface.as_vlans_mut() {
        Some(collection) if collection.contains(vlan_id) => {
            Err(RemoteError::conflict("vlan", vlan.interface_id))
        }
        Some(collection) => {
            collection.push(vlan);
            Ok(CommandResult::Ok)
        }
        None => {
            interface.kind = InterfaceKind::Vlan(VlanCollection { vlans: vec![vlan] });
            Ok(CommandResult::Ok)
        }
    }
}

// ── Routing derivation ──────────────────────────────────────────────

/// Re-derive the routing table from the interfaces. Networks no longer
/// backed by an address are flagged invalid rather than dropped; nodes
/// of removed top-level interfaces go away with them.
fn sync_routing(engine: &mut EngineState) {
    let mut expected: Vec<(String, Vec<String>)> = Vec::new();
    for interface in &engine.interfaces {
        match &interface.kind {
            InterfaceKind::Flat(flat) => {
                expected.push((interface.interface_id.clone(), flat.networks()));
            }
            InterfaceKind::Vlan(collection) => {
                for vlan in collection.iter() {
                    expected.push((vlan.interface_id.clone(), vlan.networks()));
                }
            }
        }
    }
    let parents: Vec<String> = engine
        .interfaces
        .iter()
        .map(|i| i.interface_id.clone())
        .collect();

    engine
        .routing
        .retain(|node| parents.iter().any(|p| p == node.parent_id()));
    for node in &mut engine.routing {
        let live = expected
            .iter()
            .find(|(id, _)| *id == node.interface_id)
            .map_or(&[][..], |(_, networks)| networks.as_slice());
        for network in &mut node.networks {
            network.invalid = !live.contains(&network.network);
        }
    }

    for (routing_id, networks) in expected {
        let index = match engine
            .routing
            .iter()
            .position(|n| n.interface_id == routing_id)
        {
            Some(index) => index,
            None if networks.is_empty() => continue,
            None => {
                engine.routing.push(RoutingNode::for_interface(&routing_id));
                engine.routing.len() - 1
            }
        };
        let node = &mut engine.routing[index];
        for network in networks {
            if node.network(&network).is_none() {
                node.networks.push(RoutingNetwork::new(network));
            }
        }
    }
}
