// ── Route cleanup ──
//
// After a VLAN changes its networks (or disappears), its routing node
// keeps the old networks flagged invalid. Those are removed here.

use tracing::info;

use crate::backend::ManagementBackend;
use crate::command::Command;
use crate::error::RemoteError;
use crate::model::{AddressList, RemoteInterface, RoutingNetwork, RoutingNode};
use crate::session::Session;

/// Commands that clear stale routes for the given VLAN routing ids.
/// Entries with several networks lose only their invalid ones; an entry
/// with a single network is deleted whole.
pub fn stale_routes(routing: &[RoutingNode], routing_ids: &[String]) -> Vec<Command> {
    let mut commands = Vec::new();
    for routing_id in routing_ids {
        let name = RoutingNode::vlan_route_name(routing_id);
        for node in routing.iter().filter(|n| n.name == name) {
            if node.networks.len() > 1 {
                commands.extend(node.networks.iter().filter(|n| n.invalid).map(|n| {
                    Command::DeleteRouteNetwork {
                        name: node.name.clone(),
                        network: n.network.clone(),
                    }
                }));
            } else {
                commands.push(Command::DeleteRoute {
                    name: node.name.clone(),
                });
            }
        }
    }
    commands
}

/// The routing table as the service derives it once `edited` is written
/// back: networks of its VLANs that no address backs any more are flagged
/// invalid, and networks it gained are added.
pub fn project(routing: &[RoutingNode], edited: &RemoteInterface) -> Vec<RoutingNode> {
    let mut projected = routing.to_vec();
    let Some(collection) = edited.as_vlans() else {
        return projected;
    };

    for node in projected
        .iter_mut()
        .filter(|n| n.interface_id.contains('.') && n.parent_id() == edited.interface_id)
    {
        let live = collection
            .iter()
            .find(|v| v.interface_id == node.interface_id)
            .map(AddressList::networks)
            .unwrap_or_default();
        for network in &mut node.networks {
            network.invalid = !live.contains(&network.network);
        }
    }

    for vlan in collection.iter() {
        let networks = vlan.networks();
        match projected.iter_mut().find(|n| n.interface_id == vlan.interface_id) {
            Some(node) => {
                for network in networks {
                    if node.network(&network).is_none() {
                        node.networks.push(RoutingNetwork::new(network));
                    }
                }
            }
            None if networks.is_empty() => {}
            None => {
                let mut node = RoutingNode::for_interface(&vlan.interface_id);
                node.networks = networks.into_iter().map(RoutingNetwork::new).collect();
                projected.push(node);
            }
        }
    }
    projected
}

/// Remove stale routes left behind by writing `edited` back. Check mode
/// never sent the edit, so the table is projected through it first.
pub async fn cleanup<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    routing_ids: &[String],
    edited: &RemoteInterface,
) -> Result<bool, RemoteError> {
    if routing_ids.is_empty() {
        return Ok(false);
    }
    let mut routing = session.backend().routing(session.engine()).await?;
    if session.is_check() {
        routing = project(&routing, edited);
    }
    let commands = stale_routes(&routing, routing_ids);
    let changed = !commands.is_empty();
    for command in commands {
        info!(subject = %command.target(), "removing stale route");
        session.issue(command).await?;
    }
    Ok(changed)
}
