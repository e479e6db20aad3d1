// ── BGP ──
//
// BGP is never patched in place: any relevant difference disables it
// and enables it again with the full desired configuration. Peerings
// are attached last, once the interfaces they hang off exist.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::backend::ManagementBackend;
use crate::command::{AttachPeeringRequest, Command, CreateElementRequest};
use crate::error::RemoteError;
use crate::model::{AnnouncedNetwork, BgpSettings, BgpSpec, ElementRef, Handle};
use crate::resolver::ResolvedReferences;
use crate::session::Session;

/// The desired BGP sets, expressed in handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredBgp {
    pub antispoofing: Vec<Handle>,
    pub announced: Vec<AnnouncedNetwork>,
}

impl DesiredBgp {
    pub fn from_spec(spec: &BgpSpec, refs: &ResolvedReferences) -> Result<Self, RemoteError> {
        let antispoofing = spec
            .antispoofing
            .iter()
            .map(|r| lookup(refs, r))
            .collect::<Result<Vec<_>, _>>()?;
        let mut announced = Vec::with_capacity(spec.announced.len());
        for entry in &spec.announced {
            let route_map = entry
                .route_map_ref()
                .map(|r| lookup(refs, &r))
                .transpose()?;
            announced.push(AnnouncedNetwork {
                network: lookup(refs, &entry.network)?,
                route_map,
            });
        }
        Ok(Self {
            antispoofing,
            announced,
        })
    }
}

fn lookup(refs: &ResolvedReferences, reference: &ElementRef) -> Result<Handle, RemoteError> {
    refs.handle(reference)
        .cloned()
        .ok_or_else(|| RemoteError::not_found(reference.kind.to_string(), &reference.name))
}

/// Whether live BGP must be torn down and re-established.
pub fn needs_reestablish(current: &BgpSettings, spec: &BgpSpec, desired: &DesiredBgp) -> bool {
    if !current.enabled {
        return true;
    }
    if current.router_id.as_deref().unwrap_or_default() != spec.router_id.as_deref().unwrap_or_default() {
        debug!("router id differs");
        return true;
    }
    if spec.bgp_profile.is_some() && spec.bgp_profile != current.profile {
        debug!("BGP profile differs");
        return true;
    }
    let live: HashSet<&Handle> = current.antispoofing.iter().collect();
    let wanted: HashSet<&Handle> = desired.antispoofing.iter().collect();
    if live != wanted {
        debug!("antispoofing networks differ");
        return true;
    }
    announced_map(&current.announced) != announced_map(&desired.announced)
}

fn announced_map(announced: &[AnnouncedNetwork]) -> HashMap<&Handle, Option<&Handle>> {
    announced
        .iter()
        .map(|a| (&a.network, a.route_map.as_ref()))
        .collect()
}

/// Converge the BGP block of the settings draft. The caller persists
/// the draft when this returns true.
pub async fn reconcile<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    current: &mut BgpSettings,
    spec: &BgpSpec,
    refs: &ResolvedReferences,
) -> Result<bool, RemoteError> {
    if !spec.enabled {
        if current.enabled {
            info!("disabling BGP");
            current.disable();
            return Ok(true);
        }
        return Ok(false);
    }

    let desired = DesiredBgp::from_spec(spec, refs)?;
    if !needs_reestablish(current, spec, &desired) {
        debug!("BGP already matches");
        return Ok(false);
    }

    let (autonomous_system, created) = session
        .get_or_create(CreateElementRequest::autonomous_system(&spec.autonomous_system))
        .await?;
    if created {
        info!(name = %spec.autonomous_system.name, "created autonomous system");
    }

    info!(router_id = ?spec.router_id, "re-establishing BGP");
    current.disable();
    current.enable(
        autonomous_system,
        desired.antispoofing,
        spec.router_id.clone(),
        spec.bgp_profile.clone(),
    );
    for network in desired.announced {
        current.advertise_network(network);
    }
    Ok(true)
}

/// Attach every declared peering to its interface's routing node.
pub async fn apply_peerings<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    spec: &BgpSpec,
    refs: &ResolvedReferences,
) -> Result<bool, RemoteError> {
    let mut changed = false;
    for peering in &spec.peerings {
        let (handle, created) = session
            .get_or_create(CreateElementRequest::bgp_peering(&peering.name))
            .await?;
        changed |= created;
        let next_hop = lookup(refs, &peering.next_hop.element_ref())?;

        let routing = session.backend().routing(session.engine()).await?;
        match routing.iter().find(|n| n.interface_id == peering.interface_id) {
            Some(node) if node.has_peering(peering.network.as_deref(), &handle) => {
                debug!(peering = %peering.name, interface_id = %peering.interface_id, "peering already attached");
                continue;
            }
            Some(_) => {}
            None if session.is_check() => {
                debug!(interface_id = %peering.interface_id, "routing node not present yet");
            }
            None => {
                return Err(RemoteError::not_found("routing node", &peering.interface_id));
            }
        }

        info!(peering = %peering.name, interface_id = %peering.interface_id, "attaching BGP peering");
        session
            .issue(Command::AttachBgpPeering(AttachPeeringRequest {
                interface_id: peering.interface_id.clone(),
                network: peering.network.clone(),
                peering: handle,
                next_hop,
            }))
            .await?;
        changed = true;
    }
    Ok(changed)
}
