// ── Run session ──
//
// Wraps the backend for one run against one engine. Every mutation goes
// through `issue`, which journals the command and either sends it or,
// in check mode, records it as planned. The session also owns the
// changed flag so a failure mid-run can report what already happened.

use tracing::{debug, info};

use crate::backend::ManagementBackend;
use crate::command::{Command, CommandResult, CreateElementRequest};
use crate::config::RunMode;
use crate::error::RemoteError;
use crate::model::Handle;

pub struct Session<'a, B> {
    backend: &'a mut B,
    engine: String,
    mode: RunMode,
    changed: bool,
    journal: Vec<Command>,
}

impl<'a, B: ManagementBackend> Session<'a, B> {
    pub fn new(backend: &'a mut B, engine: impl Into<String>, mode: RunMode) -> Self {
        Self {
            backend,
            engine: engine.into(),
            mode,
            changed: false,
            journal: Vec::new(),
        }
    }

    /// Read access for lookups between mutations.
    pub fn backend(&self) -> &B {
        self.backend
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn is_check(&self) -> bool {
        self.mode == RunMode::Check
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn journal(&self) -> &[Command] {
        &self.journal
    }

    pub fn into_journal(self) -> Vec<Command> {
        self.journal
    }

    /// Send (or plan) one command. The changed flag is raised unless the
    /// backend reports the command as a no-op.
    pub async fn issue(&mut self, command: Command) -> Result<CommandResult, RemoteError> {
        let result = match self.mode {
            RunMode::Check => {
                info!(command = command.name(), subject = %command.target(), "planned");
                CommandResult::Planned
            }
            RunMode::Apply => {
                debug!(command = command.name(), subject = %command.target(), "issuing");
                self.backend.execute(&self.engine, &command).await?
            }
        };
        if result.changed() {
            self.changed = true;
        }
        self.journal.push(command);
        Ok(result)
    }

    /// Resolve an element by name, creating it when absent. Check mode
    /// hands out a pending handle. Returns the handle and whether it was
    /// created.
    pub async fn get_or_create(
        &mut self,
        request: CreateElementRequest,
    ) -> Result<(Handle, bool), RemoteError> {
        let (kind, name) = (request.kind, request.name.clone());
        if let Some(handle) = self.backend.resolve(kind, &name).await? {
            return Ok((handle, false));
        }
        match self.issue(Command::CreateElement(request)).await? {
            CommandResult::Created(handle) => Ok((handle, true)),
            CommandResult::Planned => Ok((Handle::pending(kind, &name), true)),
            other => Err(RemoteError::Backend(format!(
                "creating {kind} '{name}' returned {other:?}"
            ))),
        }
    }
}
