// ── Engine tags ──

use tracing::info;

use crate::backend::ManagementBackend;
use crate::command::Command;
use crate::error::RemoteError;
use crate::session::Session;

/// Add missing tags; an empty desired list clears every attached tag.
pub async fn reconcile<B: ManagementBackend>(
    session: &mut Session<'_, B>,
    current: &[String],
    desired: &[String],
) -> Result<bool, RemoteError> {
    if desired.is_empty() {
        if current.is_empty() {
            return Ok(false);
        }
        info!(count = current.len(), "clearing tags");
        session.issue(Command::ClearTags).await?;
        return Ok(true);
    }

    let mut changed = false;
    for tag in desired.iter().filter(|t| !current.contains(*t)) {
        info!(%tag, "adding tag");
        session.issue(Command::AddTag { name: tag.clone() }).await?;
        changed = true;
    }
    Ok(changed)
}
