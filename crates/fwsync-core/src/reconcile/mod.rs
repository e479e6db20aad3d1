// ── Reconcilers ──
//
// One module per sub-resource of the engine. Pure reconcilers edit the
// settings draft and report whether it changed; the rest issue commands
// through the session.

pub mod bgp;
pub mod general;
pub mod interfaces;
pub mod management;
pub mod routes;
pub mod snmp;
pub mod tags;
