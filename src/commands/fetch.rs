//! Handle a batch of fetch commands

use tokio::io::AsyncWrite;

use super::write_line;
use crate::{
    client::{dedupe, FetchRequest},
    error::Result,
    protocol::FetchDirective,
    session::Session,
};

/// Download a pack for the batch and hand it to index-pack.
///
/// The reply is always a single blank line: a failed fetch leaves the objects
/// missing and git reports that itself.
pub async fn handle<W: AsyncWrite + Unpin>(
    session: &Session,
    output: &mut W,
    batch: &[FetchDirective],
) -> Result<()> {
    let wants = dedupe(batch.iter().map(|d| d.sha.clone()).collect());
    tracing::debug!("fetch batch: {} directive(s), {} want(s)", batch.len(), wants.len());

    if wants.is_empty() {
        return write_line(output, "").await;
    }

    match session.connection() {
        Ok(_) => {
            if let Err(e) = fetch_into_repo(session, wants).await {
                tracing::error!("fetch failed: {}", e);
            }
        }
        Err(e) => tracing::warn!("skipping fetch: {}", e),
    }

    write_line(output, "").await
}

async fn fetch_into_repo(session: &Session, wants: Vec<String>) -> Result<()> {
    let (remote, client) = session.connection()?;
    let request = FetchRequest {
        wants,
        haves: Vec::new(),
        shallow: Vec::new(),
        depth: session.depth(),
    };

    let pack = client.fetch_pack(&remote.org, &remote.repo, request).await?;
    session.indexer().index(pack, session.show_progress()).await?;
    tracing::info!("fetch completed");
    Ok(())
}
