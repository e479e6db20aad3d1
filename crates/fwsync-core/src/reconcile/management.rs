// ── Management interface selectors ──

use tracing::info;

use crate::backend::ManagementBackend;
use crate::command::Command;
use crate::error::RemoteError;
use crate::model::InterfaceOptions;
use crate::session::Session;

/// Point primary/backup management and heartbeat at the declared
/// interfaces. One update covers all three.
pub async fn reconcile<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    current: &InterfaceOptions,
    desired: &InterfaceOptions,
) -> Result<bool, RemoteError> {
    if current == desired {
        return Ok(false);
    }
    info!(
        primary_mgt = %desired.primary_mgt,
        backup_mgt = ?desired.backup_mgt,
        primary_heartbeat = ?desired.primary_heartbeat,
        "updating management interfaces"
    );
    session
        .issue(Command::SetInterfaceOptions(desired.clone()))
        .await?;
    Ok(true)
}
