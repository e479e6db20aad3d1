// ── End-to-end reconciliation scenarios ──
//
// Whole runs against the in-memory management service: create, converge,
// re-run, failure and check-mode behaviour.

#![allow(clippy::unwrap_used)]

use fwsync_core::{
    ClusterDocument, Command, ElementKind, ElementRef, MemoryBackend, ReconcileError, Reconciler,
    RunOptions, ValidationError,
};
use pretty_assertions::assert_eq;

const BASE: &str = r"
name: fw
cluster_mode: standby
primary_mgt: 0
tags: [prod]
interfaces:
  - interface_id: 0
    cluster_virtual: 1.1.1.1
    network_value: 1.1.1.0/24
    macaddress: 02:02:02:02:02:01
    nodes:
      - {address: 1.1.1.2, network_value: 1.1.1.0/24, nodeid: 1}
      - {address: 1.1.1.3, network_value: 1.1.1.0/24, nodeid: 2}
";

const VLAN_3: &str = r"
  - interface_id: 2
    vlan_id: 3
    zone_ref: internal
    cluster_virtual: CVI3
    network_value: 3.3.3.0/24
    macaddress: 02:02:02:02:02:03
    nodes:
      - {address: 3.3.3.2, network_value: 3.3.3.0/24, nodeid: 1}
      - {address: 3.3.3.3, network_value: 3.3.3.0/24, nodeid: 2}
";

const VLAN_4: &str = r"
  - interface_id: 2
    vlan_id: 4
    nodes:
      - {address: 4.4.4.2, network_value: 4.4.4.0/24, nodeid: 1}
      - {address: 4.4.4.3, network_value: 4.4.4.0/24, nodeid: 2}
";

const FLAT_1: &str = r"
  - interface_id: 1
    cluster_virtual: 2.2.2.1
    network_value: 2.2.2.0/24
    macaddress: 02:02:02:02:02:02
    nodes:
      - {address: 2.2.2.2, network_value: 2.2.2.0/24, nodeid: 1}
      - {address: 2.2.2.3, network_value: 2.2.2.0/24, nodeid: 2}
";

const VLAN_1_5: &str = r"
  - interface_id: 1
    vlan_id: 5
    nodes:
      - {address: 5.5.5.2, network_value: 5.5.5.0/24, nodeid: 1}
      - {address: 5.5.5.3, network_value: 5.5.5.0/24, nodeid: 2}
";

const BGP: &str = r"
bgp:
  router_id: ROUTER_ID
  autonomous_system: {name: as-200, as_number: 200}
  announced_network:
    - network: {name: net-a}
  antispoofing_network:
    network: [net-a]
  bgp_peering:
    - {name: peer-1, external_bgp_peer: extpeer, interface_id: 2.3}
";

fn document(yaml: &str) -> ClusterDocument {
    ClusterDocument::from_yaml(yaml).unwrap()
}

fn with_vlans(cvi: &str, include_vlan_4: bool) -> String {
    let mut yaml = BASE.to_owned();
    yaml.push_str(&VLAN_3.replace("CVI3", cvi));
    if include_vlan_4 {
        yaml.push_str(VLAN_4);
    }
    yaml
}

fn with_bgp(router_id: &str) -> String {
    let mut yaml = with_vlans("3.3.3.1", false);
    yaml.push_str(&BGP.replace("ROUTER_ID", router_id));
    yaml
}

fn with_flat(extra: &str) -> String {
    format!("{BASE}{extra}")
}

fn names(commands: &[Command]) -> Vec<&str> {
    commands.iter().map(Command::name).collect()
}

fn seeded() -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    backend.add_element(ElementKind::Network, "net-a");
    backend.add_element(ElementKind::ExternalBgpPeer, "extpeer");
    backend
}

async fn created(yaml: &str) -> Reconciler<MemoryBackend> {
    let mut reconciler = Reconciler::new(seeded(), RunOptions::apply());
    let report = reconciler.run(document(yaml)).await.unwrap();
    assert!(report.changed);
    reconciler
}

/// Run `yaml`, check the commands it issued, then check a rerun is a no-op.
async fn converge(reconciler: &mut Reconciler<MemoryBackend>, yaml: &str, expected: &[&str]) {
    let report = reconciler.run(document(yaml)).await.unwrap();
    assert!(report.changed);
    assert_eq!(names(&report.commands), expected);

    let rerun = reconciler.run(document(yaml)).await.unwrap();
    assert!(!rerun.changed);
    assert!(rerun.commands.is_empty());
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_engine_is_created_with_its_interfaces() {
    let mut reconciler = Reconciler::new(seeded(), RunOptions::apply());
    let report = reconciler
        .run(document(&with_vlans("3.3.3.1", true)))
        .await
        .unwrap();

    assert!(report.changed);
    assert_eq!(names(&report.commands), vec!["create_engine", "add_tag"]);
    let Command::CreateEngine(request) = &report.commands[0] else {
        panic!("expected create_engine first");
    };
    assert_eq!(request.nodes, 2);
    assert_eq!(request.interface_options.primary_mgt, "0");

    let engine = report.state.unwrap();
    assert_eq!(engine.cluster_size(), 2);
    assert_eq!(engine.tags, vec!["prod".to_owned()]);
    let vlans = engine.interface("2").unwrap().as_vlans().unwrap();
    assert_eq!(vlans.vlan_ids(), vec!["3".to_owned(), "4".to_owned()]);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let yaml = with_vlans("3.3.3.1", true);
    let mut reconciler = created(&yaml).await;
    let before = reconciler.backend().history().len();

    let report = reconciler.run(document(&yaml)).await.unwrap();
    assert!(!report.changed);
    assert!(report.commands.is_empty());
    assert_eq!(reconciler.backend().history().len(), before);
}

// ── Interfaces & routes ─────────────────────────────────────────────

#[tokio::test]
async fn cvi_address_change_keeps_routes() {
    let mut reconciler = created(&with_vlans("3.3.3.1", true)).await;

    let report = reconciler
        .run(document(&with_vlans("3.3.3.10", true)))
        .await
        .unwrap();
    assert!(report.changed);
    assert_eq!(names(&report.commands), vec!["update_interface"]);

    let engine = report.state.unwrap();
    let vlan = engine.interface("2").unwrap().as_vlans().unwrap().get("3").unwrap();
    assert_eq!(vlan.addresses[0].address, "3.3.3.10");
    assert!(engine.routing.iter().any(|n| n.name == "VLAN 2.3"));
}

#[tokio::test]
async fn omitted_vlan_is_deleted_with_its_route() {
    let mut reconciler = created(&with_vlans("3.3.3.1", true)).await;
    assert!(
        reconciler
            .backend()
            .engine("fw")
            .unwrap()
            .routing
            .iter()
            .any(|n| n.name == "VLAN 2.4")
    );

    let report = reconciler
        .run(document(&with_vlans("3.3.3.1", false)))
        .await
        .unwrap();
    assert_eq!(names(&report.commands), vec!["update_interface", "delete_route"]);
    assert_eq!(
        report.commands[1],
        Command::DeleteRoute {
            name: "VLAN 2.4".into()
        }
    );

    let engine = report.state.unwrap();
    let vlans = engine.interface("2").unwrap().as_vlans().unwrap();
    assert_eq!(vlans.vlan_ids(), vec!["3".to_owned()]);
    assert!(engine.routing.iter().all(|n| n.name != "VLAN 2.4"));
}

#[tokio::test]
async fn vlan_mask_change_drops_only_the_old_network() {
    let mut reconciler = created(&with_vlans("3.3.3.1", false)).await;
    let yaml = with_vlans("3.3.3.1", false).replace("3.3.3.0/24", "3.3.0.0/16");

    converge(&mut reconciler, &yaml, &["update_interface", "delete_route_network"]).await;

    let engine = reconciler.backend().engine("fw").unwrap();
    let node = engine
        .routing
        .iter()
        .find(|n| n.name == "VLAN 2.3")
        .unwrap();
    let networks: Vec<&str> = node.networks.iter().map(|n| n.network.as_str()).collect();
    assert_eq!(networks, vec!["3.3.0.0/16"]);
}

#[tokio::test]
async fn flat_interface_addresses_are_changed_in_place() {
    let mut reconciler = created(&with_flat(FLAT_1)).await;
    let yaml = with_flat(&FLAT_1.replace("cluster_virtual: 2.2.2.1", "cluster_virtual: 2.2.2.9"));

    converge(&mut reconciler, &yaml, &["change_cluster_interface"]).await;

    let engine = reconciler.backend().engine("fw").unwrap();
    let flat = engine.interface("1").unwrap().as_flat().unwrap();
    assert_eq!(flat.addresses[0].address, "2.2.2.9");
}

#[tokio::test]
async fn flat_interface_without_addresses_is_reset() {
    let mut reconciler = created(&with_flat(FLAT_1)).await;

    converge(&mut reconciler, &with_flat("  - interface_id: 1\n"), &["reset_interface"]).await;

    let engine = reconciler.backend().engine("fw").unwrap();
    assert!(engine.interface("1").unwrap().is_addressless());
}

#[tokio::test]
async fn reserved_interface_gains_vlans() {
    let mut reconciler = created(&with_flat(FLAT_1)).await;
    reconciler
        .run(document(&with_flat("  - interface_id: 1\n")))
        .await
        .unwrap();

    converge(&mut reconciler, &with_flat(VLAN_1_5), &["add_ip_address_and_vlan"]).await;

    let engine = reconciler.backend().engine("fw").unwrap();
    let vlans = engine.interface("1").unwrap().as_vlans().unwrap();
    assert_eq!(vlans.vlan_ids(), vec!["5".to_owned()]);
    assert!(engine.routing.iter().any(|n| n.name == "VLAN 1.5"));
}

#[tokio::test]
async fn undeclared_interface_is_deleted() {
    let mut reconciler = created(&with_flat(FLAT_1)).await;

    converge(&mut reconciler, BASE, &["delete_interface"]).await;

    let engine = reconciler.backend().engine("fw").unwrap();
    assert!(engine.interface("1").is_none());
    assert!(engine.routing.iter().all(|n| n.parent_id() != "1"));
}

#[tokio::test]
async fn management_selectors_follow_the_document() {
    let mut reconciler = created(&with_flat(FLAT_1)).await;
    let yaml = format!("{}backup_mgt: 1\nprimary_heartbeat: 1\n", with_flat(FLAT_1));

    converge(&mut reconciler, &yaml, &["set_interface_options"]).await;

    let options = &reconciler.backend().engine("fw").unwrap().interface_options;
    assert_eq!(options.primary_mgt, "0");
    assert_eq!(options.backup_mgt.as_deref(), Some("1"));
    assert_eq!(options.primary_heartbeat.as_deref(), Some("1"));
}

#[tokio::test]
async fn vlan_collection_is_never_flattened() {
    let mut reconciler = created(&with_vlans("3.3.3.1", true)).await;

    let flat = format!(
        "{BASE}{}",
        r"
  - interface_id: 2
    cluster_virtual: 5.5.5.1
    network_value: 5.5.5.0/24
    macaddress: 02:02:02:02:02:05
"
    );
    let report = reconciler.run(document(&flat)).await.unwrap();
    assert!(
        report
            .commands
            .iter()
            .all(|c| !matches!(c, Command::ChangeClusterInterface(_)))
    );
    let engine = report.state.unwrap();
    assert!(engine.interface("2").unwrap().as_vlans().is_some());
}

#[tokio::test]
async fn skip_interfaces_leaves_them_alone() {
    let mut reconciler = created(&with_vlans("3.3.3.1", true)).await;
    let mut yaml = with_vlans("3.3.3.10", false);
    yaml.push_str("skip_interfaces: true\n");

    let report = reconciler.run(document(&yaml)).await.unwrap();
    assert!(!report.changed);
    let engine = report.state.unwrap();
    assert_eq!(engine.interface("2").unwrap().as_vlans().unwrap().len(), 2);
}

// ── Engine settings & tags ──────────────────────────────────────────

#[tokio::test]
async fn general_settings_are_updated_in_one_command() {
    let mut reconciler = created(&with_vlans("3.3.3.1", false)).await;
    let mut yaml = with_vlans("3.3.3.1", false);
    yaml.push_str("antivirus: true\ndomain_server_address: [8.8.8.8]\nlocation: dmz\n");

    let report = reconciler.run(document(&yaml)).await.unwrap();
    assert_eq!(names(&report.commands), vec!["update_engine"]);
    let engine = report.state.unwrap();
    assert!(engine.settings.antivirus);
    assert_eq!(engine.settings.domain_server_address, vec!["8.8.8.8".to_owned()]);
    assert_eq!(engine.settings.location.as_deref(), Some("dmz"));
}

#[tokio::test]
async fn empty_tag_list_clears_tags() {
    let mut reconciler = created(&with_vlans("3.3.3.1", false)).await;
    let yaml = with_vlans("3.3.3.1", false).replace("tags: [prod]", "tags: []");

    let report = reconciler.run(document(&yaml)).await.unwrap();
    assert_eq!(names(&report.commands), vec!["clear_tags"]);
    assert!(report.state.unwrap().tags.is_empty());
}

// ── BGP ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bgp_is_enabled_and_peered_on_create() {
    let reconciler = created(&with_bgp("1.1.1.1")).await;
    let backend = reconciler.backend();
    let engine = backend.engine("fw").unwrap();

    let bgp = &engine.settings.bgp;
    assert!(bgp.enabled);
    assert_eq!(bgp.router_id.as_deref(), Some("1.1.1.1"));
    assert_eq!(bgp.antispoofing.len(), 1);
    assert_eq!(bgp.announced.len(), 1);

    let peering = backend
        .elements()
        .iter()
        .find(|e| e.kind == ElementKind::BgpPeering && e.name == "peer-1")
        .unwrap();
    let node = engine
        .routing
        .iter()
        .find(|n| n.interface_id == "2.3")
        .unwrap();
    assert!(node.has_peering(None, &peering.handle));
    assert!(
        backend
            .elements()
            .iter()
            .any(|e| e.kind == ElementKind::AutonomousSystem && e.name == "as-200")
    );
}

#[tokio::test]
async fn router_id_change_reestablishes_bgp() {
    let mut reconciler = created(&with_bgp("1.1.1.1")).await;
    let before = reconciler.backend().engine("fw").unwrap().settings.bgp.clone();

    let report = reconciler.run(document(&with_bgp("2.2.2.2"))).await.unwrap();
    assert_eq!(names(&report.commands), vec!["update_engine"]);

    let after = report.state.unwrap().settings.bgp;
    assert!(after.enabled);
    assert_eq!(after.router_id.as_deref(), Some("2.2.2.2"));
    assert_eq!(after.antispoofing, before.antispoofing);
    assert_eq!(after.announced, before.announced);
    assert_eq!(after.autonomous_system, before.autonomous_system);
}

#[tokio::test]
async fn unresolved_references_abort_before_any_mutation() {
    let mut backend = MemoryBackend::new();
    backend.add_element(ElementKind::ExternalBgpPeer, "extpeer");
    let mut reconciler = Reconciler::new(backend, RunOptions::apply());

    let err = reconciler.run(document(&with_bgp("1.1.1.1"))).await.unwrap_err();
    let ReconcileError::UnresolvedReferences { missing } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].name, "net-a");
    assert!(!err.changed());
    assert!(reconciler.backend().history().is_empty());
    assert!(reconciler.backend().engine("fw").is_none());
}

// ── Log server ──────────────────────────────────────────────────────

#[tokio::test]
async fn log_server_is_resolved_and_kept_converged() {
    let mut backend = seeded();
    let first = backend.add_element(ElementKind::LogServer, "log-1");
    let second = backend.add_element(ElementKind::LogServer, "log-2");
    let mut reconciler = Reconciler::new(backend, RunOptions::apply());
    let yaml = format!("{}log_server: log-1\n", with_vlans("3.3.3.1", false));

    let report = reconciler.run(document(&yaml)).await.unwrap();
    let Command::CreateEngine(request) = &report.commands[0] else {
        panic!("expected create_engine first");
    };
    assert_eq!(request.log_server.as_ref(), Some(&first));
    assert_eq!(report.state.unwrap().settings.log_server, Some(first));

    let moved = yaml.replace("log-1", "log-2");
    converge(&mut reconciler, &moved, &["update_engine"]).await;
    let engine = reconciler.backend().engine("fw").unwrap();
    assert_eq!(engine.settings.log_server, Some(second));
}

#[tokio::test]
async fn missing_log_server_aborts_before_any_mutation() {
    let mut reconciler = Reconciler::new(seeded(), RunOptions::apply());
    let yaml = format!("{}log_server: nowhere\n", with_vlans("3.3.3.1", false));

    let err = reconciler.run(document(&yaml)).await.unwrap_err();
    let ReconcileError::UnresolvedReferences { missing } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(missing, &vec![ElementRef::new(ElementKind::LogServer, "nowhere")]);
    assert!(reconciler.backend().history().is_empty());
    assert!(reconciler.backend().engine("fw").is_none());
}

// ── State & modes ───────────────────────────────────────────────────

#[tokio::test]
async fn absent_engine_is_deleted_once() {
    let mut reconciler = created(&with_vlans("3.3.3.1", false)).await;
    let absent = document("name: fw\nstate: absent\n");

    let report = reconciler.run(absent.clone()).await.unwrap();
    assert!(report.changed);
    assert_eq!(names(&report.commands), vec!["delete_engine"]);
    assert!(report.state.is_none());

    let report = reconciler.run(absent).await.unwrap();
    assert!(!report.changed);
    assert!(report.commands.is_empty());
}

#[tokio::test]
async fn check_mode_plans_without_sending() {
    let mut reconciler = Reconciler::new(seeded(), RunOptions::check());
    let report = reconciler
        .run(document(&with_vlans("3.3.3.1", true)))
        .await
        .unwrap();

    assert!(report.changed);
    assert_eq!(names(&report.commands), vec!["create_engine"]);
    assert!(report.state.is_none());
    assert!(reconciler.backend().history().is_empty());
    assert!(reconciler.backend().engine("fw").is_none());
}

#[tokio::test]
async fn check_mode_reports_the_same_changes_as_apply() {
    let reconciler = created(&with_vlans("3.3.3.1", true)).await;
    let backend = reconciler.into_backend();
    let target = document(&with_vlans("3.3.3.1", false));

    let mut check = Reconciler::new(backend.clone(), RunOptions::check());
    let planned = check.run(target.clone()).await.unwrap();
    let mut apply = Reconciler::new(backend, RunOptions::apply());
    let applied = apply.run(target).await.unwrap();

    assert!(planned.changed);
    assert_eq!(names(&planned.commands)[0], "update_interface");
    assert_eq!(planned.commands[0], applied.commands[0]);
    assert_eq!(
        check.backend().engine("fw").unwrap().interface("2"),
        planned.state.as_ref().unwrap().interface("2")
    );
}

#[tokio::test]
async fn check_mode_plans_the_same_route_cleanup_as_apply() {
    let backend = created(&with_vlans("3.3.3.1", false)).await.into_backend();
    let target = document(&with_vlans("3.3.3.1", false).replace("3.3.3.0/24", "3.3.0.0/16"));

    let mut check = Reconciler::new(backend.clone(), RunOptions::check());
    let planned = check.run(target.clone()).await.unwrap();
    let mut apply = Reconciler::new(backend, RunOptions::apply());
    let applied = apply.run(target).await.unwrap();

    assert_eq!(names(&planned.commands), vec!["update_interface", "delete_route_network"]);
    assert_eq!(planned.commands, applied.commands);
    assert_eq!(
        planned.commands[1],
        Command::DeleteRouteNetwork {
            name: "VLAN 2.3".into(),
            network: "3.3.3.0/24".into(),
        }
    );
    assert!(check.backend().history().is_empty());
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_failure_reports_partial_change() {
    let mut reconciler = created(&with_vlans("3.3.3.1", true)).await;
    reconciler.backend_mut().fail_on("delete_route");

    let err = reconciler
        .run(document(&with_vlans("3.3.3.1", false)))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { .. }));
    assert!(err.changed());
}

#[tokio::test]
async fn first_command_failure_reports_no_change() {
    let mut reconciler = Reconciler::new(seeded(), RunOptions::apply());
    reconciler.backend_mut().fail_on("create_engine");

    let err = reconciler
        .run(document(&with_vlans("3.3.3.1", false)))
        .await
        .unwrap_err();
    assert!(!err.changed());
}

#[tokio::test]
async fn duplicate_node_ids_are_rejected() {
    let yaml = r"
name: fw
interfaces:
  - interface_id: 0
    nodes:
      - {address: 1.1.1.2, network_value: 1.1.1.0/24, nodeid: 1}
      - {address: 1.1.1.3, network_value: 1.1.1.0/24, nodeid: 1}
";
    let mut reconciler = Reconciler::new(MemoryBackend::new(), RunOptions::apply());
    let err = reconciler.run(document(yaml)).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Validation(ValidationError::Duplicate { .. })
    ));
    assert!(reconciler.backend().history().is_empty());
}
