// ── Run orchestrator ──
//
// Sequences the reconcilers against one engine in dependency order:
// engine create-or-update, general settings, interfaces (with route
// cleanup), management selectors, undeclared-interface removal, BGP,
// peerings, tags. Everything that can fail without side effects
// (validation, reference resolution) happens before the first command.

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::ManagementBackend;
use crate::command::{Command, CreateClusterRequest};
use crate::config::{RunMode, RunOptions};
use crate::error::{ReconcileError, RemoteError};
use crate::model::{
    ClusterDocument, DesiredCluster, DesiredState, EngineSettings, EngineState, Handle,
};
use crate::reconcile::{bgp, general, interfaces, management, snmp, tags};
use crate::resolver::{ResolvedReferences, resolve_references};
use crate::session::Session;

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub engine: String,
    pub mode: RunMode,
    pub changed: bool,
    /// Commands issued (or planned, in check mode), in order.
    pub commands: Vec<Command>,
    /// Engine after the run; in check mode, as it was before.
    pub state: Option<EngineState>,
}

/// Drives reconciliation runs against a backend it owns.
pub struct Reconciler<B> {
    backend: B,
    options: RunOptions,
}

impl<B: ManagementBackend> Reconciler<B> {
    pub fn new(backend: B, options: RunOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Validate a raw document and reconcile it.
    pub async fn run(&mut self, document: ClusterDocument) -> Result<RunReport, ReconcileError> {
        let desired = DesiredCluster::from_document(document)?;
        self.run_desired(&desired).await
    }

    pub async fn run_desired(
        &mut self,
        desired: &DesiredCluster,
    ) -> Result<RunReport, ReconcileError> {
        let name = desired.name.as_str();
        info!(engine = name, mode = %self.options.mode, state = %desired.state, "starting reconciliation");

        let refs = resolve_references(&self.backend, desired.references())
            .await
            .map_err(|source| remote(source, false))?
            .into_complete()?;

        let existing = self
            .backend
            .fetch_engine(name)
            .await
            .map_err(|source| remote(source, false))?;

        // Remaining validation depends on what exists.
        let cluster_size = match (desired.state, &existing) {
            (DesiredState::Present, None) => desired.validate_for_create()?,
            (DesiredState::Present, Some(engine)) => {
                desired.interfaces.validate_cluster_size(engine.cluster_size())?;
                engine.cluster_size()
            }
            (DesiredState::Absent, _) => 0,
        };
        let skip_interfaces = desired.skip_interfaces || self.options.skip_interfaces;

        let mut session = Session::new(&mut self.backend, name, self.options.mode);
        let outcome = match (desired.state, &existing) {
            (DesiredState::Absent, None) => {
                info!(engine = name, "engine already absent");
                Ok(())
            }
            (DesiredState::Absent, Some(_)) => delete_engine(&mut session).await,
            (DesiredState::Present, None) => {
                create_engine(&mut session, desired, cluster_size, &refs).await
            }
            (DesiredState::Present, Some(engine)) => {
                update_engine(&mut session, desired, engine, &refs, skip_interfaces).await
            }
        };
        let changed = session.changed();
        if let Err(source) = outcome {
            warn!(engine = name, changed, error = %source, "reconciliation aborted");
            return Err(remote(source, changed));
        }
        let commands = session.into_journal();

        let state = match self.options.mode {
            RunMode::Check => existing,
            RunMode::Apply => self
                .backend
                .fetch_engine(name)
                .await
                .map_err(|source| remote(source, changed))?,
        };
        info!(engine = name, changed, commands = commands.len(), "reconciliation finished");
        Ok(RunReport {
            engine: desired.name.clone(),
            mode: self.options.mode,
            changed,
            commands,
            state,
        })
    }
}

/// Handle of the declared log server; absent from the document means
/// leave the engine's setting alone.
fn log_server(desired: &DesiredCluster, refs: &ResolvedReferences) -> Option<Handle> {
    desired
        .log_server_ref()
        .and_then(|reference| refs.handle(&reference).cloned())
}

fn remote(source: RemoteError, changed: bool) -> ReconcileError {
    ReconcileError::Remote { source, changed }
}

async fn delete_engine<B: ManagementBackend>(
    session: &mut Session<'_, B>,
) -> Result<(), RemoteError> {
    info!(engine = session.engine(), "deleting engine");
    session.issue(Command::DeleteEngine).await?;
    Ok(())
}

async fn create_engine<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    desired: &DesiredCluster,
    cluster_size: usize,
    refs: &ResolvedReferences,
) -> Result<(), RemoteError> {
    info!(engine = %desired.name, nodes = cluster_size, "creating cluster");
    let request = CreateClusterRequest::from_desired(desired, cluster_size)
        .with_log_server(log_server(desired, refs));
    session
        .issue(Command::CreateEngine(Box::new(request)))
        .await?;

    if session.is_check() {
        // Nothing to diff against until the engine exists.
        return Ok(());
    }
    let engine = session
        .backend()
        .fetch_engine(&desired.name)
        .await?
        .ok_or_else(|| RemoteError::not_found("engine", &desired.name))?;
    let mut settings = engine.settings.clone();
    apply_bgp(session, desired, &mut settings, refs).await?;
    tags::reconcile(session, &engine.tags, &desired.tags).await?;
    Ok(())
}

async fn update_engine<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    desired: &DesiredCluster,
    engine: &EngineState,
    refs: &ResolvedReferences,
    skip_interfaces: bool,
) -> Result<(), RemoteError> {
    let mut settings = engine.settings.clone();
    let mut dirty = general::reconcile(&mut settings, &desired.general);
    if let Some(spec) = &desired.snmp {
        dirty |= snmp::reconcile(&mut settings.snmp, spec);
    }
    if settings.comment != desired.comment && desired.comment.is_some() {
        settings.comment.clone_from(&desired.comment);
        dirty = true;
    }
    if let Some(handle) = log_server(desired, refs) {
        if settings.log_server.as_ref() != Some(&handle) {
            settings.log_server = Some(handle);
            dirty = true;
        }
    }
    if dirty {
        info!(engine = %desired.name, "updating engine settings");
        session
            .issue(Command::UpdateEngine(Box::new(settings.clone())))
            .await?;
    }

    if skip_interfaces {
        info!(engine = %desired.name, "skipping interfaces");
    } else {
        interfaces::reconcile(session, &desired.interfaces, engine.cluster_size()).await?;
    }
    management::reconcile(session, &engine.interface_options, &desired.management).await?;
    if !skip_interfaces {
        interfaces::delete_undeclared(session, &desired.interfaces).await?;
    }

    apply_bgp(session, desired, &mut settings, refs).await?;
    tags::reconcile(session, &engine.tags, &desired.tags).await?;
    Ok(())
}

/// BGP on the draft, persisted when it changed, then peerings.
async fn apply_bgp<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    desired: &DesiredCluster,
    settings: &mut EngineSettings,
    refs: &ResolvedReferences,
) -> Result<(), RemoteError> {
    let Some(spec) = &desired.bgp else {
        return Ok(());
    };
    if bgp::reconcile(session, &mut settings.bgp, spec, refs).await? {
        session
            .issue(Command::UpdateEngine(Box::new(settings.clone())))
            .await?;
    }
    if spec.enabled {
        bgp::apply_peerings(session, spec, refs).await?;
    }
    Ok(())
}
