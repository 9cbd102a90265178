use tokio::io::AsyncWrite;

use super::write_line;
use crate::{client::ListRefsResult, error::Result, session::Session};

/// Placeholder SHA for refs whose target is unknown
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Handle the list command
/// Output the remote's refs; on any failure advertise an empty `refs/heads/main`
/// so git still sees a well-formed ref list.
pub async fn handle<W: AsyncWrite + Unpin>(
    session: &Session,
    output: &mut W,
    for_push: bool,
) -> Result<()> {
    match list_refs(session).await {
        Ok(refs) => {
            tracing::debug!("listing {} ref(s) (for_push: {})", refs.refs.len(), for_push);
            if let Some(target) = refs.head_target() {
                write_line(output, &format!("@{} HEAD", target)).await?;
            }
            for remote_ref in &refs.refs {
                let sha = remote_ref.target().unwrap_or(ZERO_SHA);
                write_line(output, &format!("{} {}", sha, remote_ref.name)).await?;
            }
        }
        Err(e) => {
            tracing::warn!("list failed, advertising empty refs/heads/main: {}", e);
            write_line(output, &format!("{} refs/heads/main", ZERO_SHA)).await?;
        }
    }

    // Empty line signals completion
    write_line(output, "").await
}

async fn list_refs(session: &Session) -> Result<ListRefsResult> {
    let (remote, client) = session.connection()?;
    client.list_refs(&remote.org, &remote.repo).await
}
