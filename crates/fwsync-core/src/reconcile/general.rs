// ── General engine settings ──
//
// Feature toggles, DNS, location and cluster mode, applied to the
// settings draft. Unspecified values leave the live setting alone.

use std::collections::HashSet;

use tracing::info;

use crate::model::{EngineSettings, Feature, GeneralSpec};

/// Apply desired settings to the draft. Returns whether it changed.
pub fn reconcile(settings: &mut EngineSettings, desired: &GeneralSpec) -> bool {
    let mut changed = false;

    let toggles = [
        (Feature::DefaultNat, desired.default_nat),
        (Feature::FileReputation, desired.file_reputation),
        (Feature::Antivirus, desired.antivirus),
    ];
    for (feature, wanted) in toggles {
        let Some(wanted) = wanted else { continue };
        if settings.feature(feature) != wanted {
            info!(%feature, enabled = wanted, "toggling engine feature");
            settings.set_feature(feature, wanted);
            changed = true;
        }
    }

    if let Some(servers) = &desired.domain_server_address {
        if dns_differs(&settings.domain_server_address, servers) {
            info!(servers = ?servers, "replacing DNS servers");
            settings.clear_dns();
            settings.add_dns(servers);
            changed = true;
        }
    }

    if settings.location != desired.location {
        info!(location = ?desired.location, "updating location");
        settings.location.clone_from(&desired.location);
        changed = true;
    }

    if settings.cluster_mode != desired.cluster_mode {
        info!(mode = %desired.cluster_mode, "changing cluster mode");
        settings.cluster_mode = desired.cluster_mode;
        changed = true;
    }

    changed
}

/// Order does not matter, only membership.
fn dns_differs(current: &[String], desired: &[String]) -> bool {
    let current: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired: HashSet<&str> = desired.iter().map(String::as_str).collect();
    current.symmetric_difference(&desired).next().is_some()
}
