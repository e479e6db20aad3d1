// ── SNMP ──
//
// Any difference re-enables SNMP with the full desired configuration.

use std::collections::HashSet;

use tracing::info;

use crate::model::{SnmpSettings, SnmpSpec};

pub fn reconcile(current: &mut SnmpSettings, desired: &SnmpSpec) -> bool {
    if !desired.enabled {
        if current.enabled {
            info!("disabling SNMP");
            current.disable();
            return true;
        }
        return false;
    }

    if current.enabled && !differs(current, desired) {
        return false;
    }
    info!(agent = %desired.agent, "enabling SNMP");
    current.enable(
        desired.agent.clone(),
        desired.location.clone(),
        desired.interfaces.clone(),
    );
    true
}

fn differs(current: &SnmpSettings, desired: &SnmpSpec) -> bool {
    let interfaces: HashSet<&str> = current.interfaces.iter().map(String::as_str).collect();
    let wanted: HashSet<&str> = desired.interfaces.iter().map(String::as_str).collect();
    current.agent.as_deref() != Some(desired.agent.as_str())
        || current.location != desired.location
        || interfaces != wanted
}
