// ── Interface and VLAN reconciliation ──
//
// Each desired interface group is classified against the remote
// interface with the same id (absent, addressless, flat, or a VLAN
// collection) and converged with as few calls as possible. VLAN
// collections are edited on a local copy and written back whole.

use tracing::{debug, info, warn};

use super::routes;
use crate::backend::{Lookup, ManagementBackend};
use crate::command::{ChangeClusterInterfaceRequest, Command, CreateElementRequest};
use crate::error::RemoteError;
use crate::model::{
    AddressList, ClusterAddress, Handle, InterfaceGroup, InterfaceGroups, InterfaceSpec,
    RemoteInterface, VlanInterface,
};
use crate::session::Session;

/// What editing one VLAN did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VlanChange {
    pub changed: bool,
    /// A network went away, so routes need cleaning up.
    pub route_impacting: bool,
}

impl VlanChange {
    fn note(&mut self, route_impacting: bool) {
        self.changed = true;
        self.route_impacting |= route_impacting;
    }
}

pub async fn reconcile<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    groups: &InterfaceGroups,
    cluster_size: usize,
) -> Result<bool, RemoteError> {
    let mut changed = false;
    for group in groups.iter() {
        let lookup = session
            .backend()
            .interface(session.engine(), group.interface_id())
            .await?;
        changed |= match lookup {
            Lookup::NotFound => create_group(session, group).await?,
            Lookup::Found(remote) => {
                reconcile_existing(session, group, remote, cluster_size).await?
            }
        };
    }
    Ok(changed)
}

/// Delete every remote interface the document does not declare.
pub async fn delete_undeclared<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    groups: &InterfaceGroups,
) -> Result<bool, RemoteError> {
    let remote = session.backend().interfaces(session.engine()).await?;
    let mut changed = false;
    for interface in remote.iter().filter(|i| !groups.contains(&i.interface_id)) {
        info!(interface_id = %interface.interface_id, "deleting undeclared interface");
        session
            .issue(Command::DeleteInterface {
                interface_id: interface.interface_id.clone(),
            })
            .await?;
        changed = true;
    }
    Ok(changed)
}

async fn create_group<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    group: &InterfaceGroup,
) -> Result<bool, RemoteError> {
    let mut changed = false;
    for spec in group.specs() {
        let command = if spec.is_vlan() {
            Command::AddVlanInterface(spec.clone())
        } else if spec.is_creatable() {
            Command::AddClusterVirtualInterface(spec.clone())
        } else {
            debug!(interface_id = %spec.interface_id, "placeholder interface left uncreated");
            continue;
        };
        info!(%spec, "creating interface");
        session.issue(command).await?;
        changed = true;
    }
    Ok(changed)
}

async fn reconcile_existing<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    group: &InterfaceGroup,
    remote: RemoteInterface,
    cluster_size: usize,
) -> Result<bool, RemoteError> {
    if remote.is_addressless() && group.has_vlans() {
        for spec in group.vlans() {
            info!(%spec, "adding VLAN to reserved interface");
            session
                .issue(Command::AddIpAddressAndVlan(spec.clone()))
                .await?;
        }
        return Ok(true);
    }
    if remote.as_vlans().is_some() {
        reconcile_vlans(session, group, remote).await
    } else {
        reconcile_flat(session, group, &remote, cluster_size).await
    }
}

async fn reconcile_flat<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    group: &InterfaceGroup,
    remote: &RemoteInterface,
    cluster_size: usize,
) -> Result<bool, RemoteError> {
    let Some(spec) = group.base() else {
        if remote.has_interfaces() {
            warn!(
                interface_id = %remote.interface_id,
                "interface has addresses and cannot be converted to VLANs in place; skipping"
            );
        }
        return Ok(false);
    };
    if spec.node_count() > cluster_size {
        warn!(%spec, cluster_size, "more nodes declared than cluster members; skipping");
        return Ok(false);
    }

    if spec.has_addresses() {
        let zone = resolve_zone(session, spec).await?;
        let request = ChangeClusterInterfaceRequest::from_spec(spec, zone);
        let mut preview = remote.clone();
        if !request.apply(&mut preview) {
            debug!(%spec, "interface already matches");
            return Ok(false);
        }
        info!(%spec, "changing cluster interface");
        let result = session
            .issue(Command::ChangeClusterInterface(request))
            .await?;
        Ok(result.changed())
    } else if remote.has_interfaces() {
        info!(%spec, "resetting interface with no declared addresses");
        session
            .issue(Command::ResetInterface {
                interface_id: spec.interface_id.clone(),
            })
            .await?;
        Ok(true)
    } else {
        Ok(false)
    }
}

async fn reconcile_vlans<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    group: &InterfaceGroup,
    mut remote: RemoteInterface,
) -> Result<bool, RemoteError> {
    let parent_id = remote.interface_id.clone();
    let Some(collection) = remote.as_vlans_mut() else {
        return Ok(false);
    };

    let mut updated = false;
    let mut route_impacting: Vec<String> = Vec::new();

    for vlan_id in collection.vlan_ids() {
        let routing_id = format!("{parent_id}.{vlan_id}");
        let change = match group.vlan(&vlan_id) {
            Some(spec) => {
                let zone = resolve_zone(session, spec).await?;
                match collection.get_mut(&vlan_id) {
                    Some(vlan) if vlan.has_interfaces() => update_vlan(vlan, spec, zone),
                    Some(vlan) => construct_vlan(vlan, spec, zone),
                    None => VlanChange::default(),
                }
            }
            None => {
                let removed = collection.remove(&vlan_id);
                info!(vlan = %routing_id, "deleting undeclared VLAN");
                VlanChange {
                    changed: true,
                    route_impacting: removed.is_some_and(|v| v.has_interfaces()),
                }
            }
        };
        if change.changed {
            debug!(vlan = %routing_id, route_impacting = change.route_impacting, "VLAN changed");
            updated = true;
            if change.route_impacting {
                route_impacting.push(routing_id);
            }
        }
    }

    for spec in group.vlans() {
        let Some(vlan_id) = spec.vlan_id.as_deref() else {
            continue;
        };
        if collection.contains(vlan_id) {
            continue;
        }
        info!(%spec, "adding VLAN");
        let zone = resolve_zone(session, spec).await?;
        collection.push(VlanInterface::from_spec(&parent_id, spec, zone));
        updated = true;
    }

    if !updated {
        return Ok(false);
    }
    let edited = remote.clone();
    session
        .issue(Command::UpdateInterface(Box::new(remote)))
        .await?;
    routes::cleanup(session, &route_impacting, &edited).await?;
    Ok(true)
}

async fn resolve_zone<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    spec: &InterfaceSpec,
) -> Result<Option<Handle>, RemoteError> {
    match &spec.zone_ref {
        Some(name) => {
            let (handle, _) = session.get_or_create(CreateElementRequest::zone(name)).await?;
            Ok(Some(handle))
        }
        None => Ok(None),
    }
}

// ── Per-VLAN edits ──────────────────────────────────────────────────

fn apply_zone(vlan: &mut VlanInterface, zone: Option<Handle>, change: &mut VlanChange) {
    if vlan.zone_ref != zone {
        vlan.zone_ref = zone;
        change.note(false);
    }
}

/// Fill an addressless VLAN from its spec.
pub fn construct_vlan(
    vlan: &mut VlanInterface,
    spec: &InterfaceSpec,
    zone: Option<Handle>,
) -> VlanChange {
    let mut change = VlanChange::default();
    apply_zone(vlan, zone, &mut change);
    if vlan.populate(spec) {
        change.note(false);
    }
    change
}

/// Converge a VLAN that already carries addresses.
pub fn update_vlan(
    vlan: &mut VlanInterface,
    spec: &InterfaceSpec,
    zone: Option<Handle>,
) -> VlanChange {
    let mut change = VlanChange::default();
    apply_zone(vlan, zone, &mut change);

    if !spec.has_addresses() {
        if vlan.has_interfaces() {
            vlan.clear_addresses();
            change.note(true);
        }
        return change;
    }

    let networks_before = vlan.networks();
    let mut removed = false;

    match (spec.cvi(), vlan.cvi().is_some()) {
        (Some((address, mask)), true) => {
            if let Some(cvi) = vlan.cvi_mut() {
                if cvi.address != address {
                    cvi.address = address.to_owned();
                    change.note(false);
                }
                if cvi.network_value != mask {
                    cvi.network_value = mask.to_owned();
                    change.note(true);
                }
            }
        }
        (Some((address, mask)), false) => {
            vlan.addresses.insert(0, ClusterAddress::cvi(address, mask));
            if spec.macaddress.is_some() {
                vlan.macaddress.clone_from(&spec.macaddress);
                vlan.cvi_mode = spec.cvi_mode;
            }
            change.note(false);
        }
        (None, true) => {
            vlan.addresses.retain(|a| !a.is_cvi());
            vlan.macaddress = None;
            vlan.cvi_mode = None;
            removed = true;
        }
        (None, false) => {}
    }

    for node in spec.nodes() {
        match vlan.node_mut(node.nodeid) {
            Some(current) => {
                if current.address != node.address {
                    current.address.clone_from(&node.address);
                    change.note(false);
                }
                if current.network_value != node.network_value {
                    current.network_value.clone_from(&node.network_value);
                    change.note(true);
                }
            }
            None => {
                vlan.addresses.push(ClusterAddress::ndi(node));
                change.note(false);
            }
        }
    }

    let before = vlan.len();
    vlan.addresses
        .retain(|a| a.nodeid.is_none_or(|id| spec.node(id).is_some()));
    removed |= vlan.len() != before;

    // Dropping an address only strands a route when its network goes too.
    if removed {
        let networks_after = vlan.networks();
        change.note(networks_before.iter().any(|n| !networks_after.contains(n)));
    }
    change
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{CviMode, MacAddress, NodeSpec};

    fn node(address: &str, network: &str, nodeid: u8) -> NodeSpec {
        NodeSpec {
            address: address.into(),
            network_value: network.into(),
            nodeid,
        }
    }

    fn spec(cvi: Option<(&str, &str)>, nodes: Vec<NodeSpec>) -> InterfaceSpec {
        InterfaceSpec {
            interface_id: "2".into(),
            vlan_id: Some("3".into()),
            cluster_virtual: cvi.map(|(a, _)| a.into()),
            network_value: cvi.map(|(_, m)| m.into()),
            macaddress: None,
            zone_ref: None,
            cvi_mode: None,
            nodes,
        }
    }

    fn remote(desired: &InterfaceSpec) -> VlanInterface {
        VlanInterface::from_spec("2", desired, None)
    }

    #[test]
    fn cvi_address_change_is_not_route_impacting() {
        let current = spec(Some(("3.3.3.1", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let desired = spec(Some(("3.3.3.9", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&current);
        let change = update_vlan(&mut vlan, &desired, None);
        assert_eq!(change, VlanChange { changed: true, route_impacting: false });
        assert_eq!(vlan.cvi().unwrap().address, "3.3.3.9");
    }

    #[test]
    fn mask_change_is_route_impacting() {
        let current = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let desired = spec(None, vec![node("3.3.3.2", "3.3.0.0/16", 1)]);
        let mut vlan = remote(&current);
        let change = update_vlan(&mut vlan, &desired, None);
        assert!(change.route_impacting);
        assert_eq!(vlan.node(1).unwrap().network_value, "3.3.0.0/16");
    }

    #[test]
    fn matching_vlan_is_untouched() {
        let desired = spec(Some(("3.3.3.1", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&desired);
        assert_eq!(update_vlan(&mut vlan, &desired, None), VlanChange::default());
    }

    #[test]
    fn undeclared_addresses_are_dropped() {
        let current = spec(
            Some(("3.3.3.1", "3.3.3.0/24")),
            vec![node("3.3.3.2", "3.3.3.0/24", 1), node("3.3.3.3", "3.3.3.0/24", 2)],
        );
        let desired = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&current);
        let change = update_vlan(&mut vlan, &desired, None);
        assert_eq!(change, VlanChange { changed: true, route_impacting: false });
        assert!(vlan.cvi().is_none());
        assert_eq!(vlan.len(), 1);
    }

    #[test]
    fn removing_the_cvi_drops_its_mac() {
        let mut current = spec(Some(("3.3.3.1", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        current.macaddress = Some(MacAddress::new("02:02:02:02:02:03"));
        current.cvi_mode = Some(CviMode::PacketDispatch);
        let mut vlan = remote(&current);
        assert!(vlan.macaddress.is_some());

        let change = update_vlan(&mut vlan, &spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]), None);
        assert!(change.changed);
        assert!(vlan.cvi().is_none());
        assert_eq!(vlan.macaddress, None);
        assert_eq!(vlan.cvi_mode, None);

        let readded = spec(Some(("3.3.3.1", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        update_vlan(&mut vlan, &readded, None);
        assert!(vlan.cvi().is_some());
        assert_eq!(vlan.macaddress, None);
    }

    #[test]
    fn dropping_the_last_address_of_a_network_is_route_impacting() {
        let current = spec(
            None,
            vec![node("3.3.3.2", "3.3.3.0/24", 1), node("3.3.4.3", "3.3.4.0/24", 2)],
        );
        let desired = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&current);
        assert!(update_vlan(&mut vlan, &desired, None).route_impacting);
    }

    #[test]
    fn missing_nodes_are_added() {
        let current = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let desired = spec(
            None,
            vec![node("3.3.3.2", "3.3.3.0/24", 1), node("3.3.3.3", "3.3.3.0/24", 2)],
        );
        let mut vlan = remote(&current);
        let change = update_vlan(&mut vlan, &desired, None);
        assert_eq!(change, VlanChange { changed: true, route_impacting: false });
        assert_eq!(vlan.node(2).unwrap().address, "3.3.3.3");
    }

    #[test]
    fn no_declared_addresses_clears_the_vlan() {
        let current = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&current);
        let change = update_vlan(&mut vlan, &spec(None, Vec::new()), None);
        assert_eq!(change, VlanChange { changed: true, route_impacting: true });
        assert!(!vlan.has_interfaces());
    }

    #[test]
    fn zone_changes_are_not_route_impacting() {
        let desired = spec(None, vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = remote(&desired);
        let change = update_vlan(&mut vlan, &desired, Some(Handle::new("elements/zone/1")));
        assert_eq!(change, VlanChange { changed: true, route_impacting: false });
    }

    #[test]
    fn construct_fills_an_empty_vlan() {
        let desired = spec(Some(("3.3.3.1", "3.3.3.0/24")), vec![node("3.3.3.2", "3.3.3.0/24", 1)]);
        let mut vlan = VlanInterface::new("2", "3");
        let change = construct_vlan(&mut vlan, &desired, None);
        assert_eq!(change, VlanChange { changed: true, route_impacting: false });
        assert_eq!(vlan.len(), 2);
        let mut empty = VlanInterface::new("2", "3");
        let change = construct_vlan(&mut empty, &spec(None, Vec::new()), None);
        assert_eq!(change, VlanChange::default());
    }
}
