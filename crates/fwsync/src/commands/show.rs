//! Snapshot inspection.

use tabled::Tabled;

use fwsync_core::EngineState;
use fwsync_core::model::{AddressList, InterfaceKind, RemoteInterface, VlanCollection};

use crate::cli::{GlobalOpts, ShowArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EngineRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Nodes")]
    nodes: usize,
    #[tabled(rename = "Interfaces")]
    interfaces: usize,
    #[tabled(rename = "VLANs")]
    vlans: usize,
    #[tabled(rename = "BGP")]
    bgp: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

impl From<&EngineState> for EngineRow {
    fn from(e: &EngineState) -> Self {
        Self {
            name: e.name.clone(),
            mode: e.settings.cluster_mode.to_string(),
            nodes: e.cluster_size(),
            interfaces: e.interfaces.len(),
            vlans: e.interfaces.iter().filter_map(RemoteInterface::as_vlans).map(VlanCollection::len).sum(),
            bgp: if e.settings.bgp.enabled { "on" } else { "off" }.into(),
            tags: e.tags.join(", "),
        }
    }
}

fn addresses(list: &impl AddressList) -> String {
    if list.is_empty() {
        return "-".into();
    }
    list.addresses()
        .iter()
        .map(|a| match a.nodeid {
            Some(id) => format!("{} (node {id})", a.address),
            None => format!("{} (cvi)", a.address),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn detail(e: &EngineState) -> String {
    let s = &e.settings;
    let mut lines = vec![
        format!("Name:       {}", e.name),
        format!("Mode:       {}", s.cluster_mode),
        format!("Nodes:      {}", e.cluster_size()),
        format!("Primary:    interface {}", e.interface_options.primary_mgt),
        format!("Antivirus:  {}", s.antivirus),
        format!("NAT:        {}", s.default_nat),
        format!(
            "DNS:        {}",
            if s.domain_server_address.is_empty() {
                "-".into()
            } else {
                s.domain_server_address.join(", ")
            }
        ),
        format!("Location:   {}", s.location.as_deref().unwrap_or("-")),
        format!(
            "Log server: {}",
            s.log_server.as_ref().map_or_else(|| "-".into(), ToString::to_string)
        ),
        format!("SNMP:       {}", if s.snmp.enabled { "on" } else { "off" }),
        format!(
            "BGP:        {}",
            if s.bgp.enabled {
                format!("on (router id {})", s.bgp.router_id.as_deref().unwrap_or("-"))
            } else {
                "off".into()
            }
        ),
    ];
    if !e.tags.is_empty() {
        lines.push(format!("Tags:       {}", e.tags.join(", ")));
    }

    lines.push(String::new());
    lines.push("Interfaces:".into());
    for interface in &e.interfaces {
        match &interface.kind {
            InterfaceKind::Flat(flat) => {
                lines.push(format!("  {:<8}{}", interface.interface_id, addresses(flat)));
            }
            InterfaceKind::Vlan(collection) => {
                for vlan in collection.iter() {
                    lines.push(format!("  {:<8}{}", vlan.interface_id, addresses(vlan)));
                }
            }
        }
    }

    if !e.routing.is_empty() {
        lines.push(String::new());
        lines.push("Routing:".into());
        for node in &e.routing {
            let networks = node
                .networks
                .iter()
                .map(|n| {
                    if n.invalid {
                        format!("{} (invalid)", n.network)
                    } else {
                        n.network.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("  {:<12}{networks}", node.name));
        }
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ShowArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let snapshot = config::resolve_snapshot(global, &cfg)?;
    let backend = util::load_snapshot(&snapshot)?;

    let out = match &args.name {
        Some(name) => {
            let engine = backend
                .engine(name)
                .ok_or_else(|| CliError::EngineNotFound { name: name.clone() })?;
            output::render_single(&global.output, engine, detail, |e| e.name.clone())
        }
        None => {
            let engines: Vec<EngineState> = backend.engines().cloned().collect();
            output::render_list(&global.output, &engines, |e| EngineRow::from(e), |e| {
                e.name.clone()
            })
        }
    };
    output::emit(&out, global.quiet);
    Ok(())
}
