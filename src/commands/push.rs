//! Handle a batch of push commands

use tokio::io::AsyncWrite;

use super::write_line;
use crate::{
    client::{FunctionPush, PushDirective, PushPackResult, PushRequest, RefResult},
    config::PushTransport,
    error::{Error, Result},
    pack::PackPayload,
    session::Session,
};

/// Upload the pack with the batch's ref updates and report per-ref status.
///
/// Output is one `ok <dst>` or `error <dst> <message>` line per directive, then a
/// blank line, whether or not the upload succeeded.
pub async fn handle<W: AsyncWrite + Unpin>(
    session: &Session,
    output: &mut W,
    batch: &[PushDirective],
    pack: PackPayload,
) -> Result<()> {
    tracing::debug!(
        "push batch: {} update(s), {:?} pack bytes",
        batch.len(),
        pack.len_hint()
    );

    match upload(session, batch, pack).await {
        Ok(result) => {
            for directive in batch {
                write_line(output, &status_line(&result, directive)).await?;
            }
        }
        Err(e) => {
            tracing::error!("push failed: {}", e);
            let message = single_line(&e.to_string());
            for directive in batch {
                write_line(output, &format!("error {} {}", directive.dst, message)).await?;
            }
        }
    }

    write_line(output, "").await?; // Empty line signals completion
    Ok(())
}

async fn upload(
    session: &Session,
    batch: &[PushDirective],
    pack: PackPayload,
) -> Result<PushPackResult> {
    let remote = session.remote().ok_or(Error::ReferenceUnresolved)?;
    let config = session.config();

    match config.push_transport() {
        PushTransport::Function => {
            let (url, key) = config
                .function_url(config.push_function())
                .zip(config.service())
                .map(|(url, (_, key))| (url, key.to_string()))
                .ok_or_else(|| {
                    Error::Config("SUPABASE_URL and service key are required for push".to_string())
                })?;
            let pack = pack.into_bytes().await?;
            FunctionPush::new(session.http().clone(), url, key)
                .push(
                    &remote.org,
                    &remote.repo,
                    batch,
                    &pack,
                    session.dry_run(),
                    session.options(),
                )
                .await
        }
        PushTransport::Multipart => {
            let (remote, client) = session.connection()?;
            client
                .push_pack(PushRequest {
                    org: &remote.org,
                    repo: &remote.repo,
                    updates: batch,
                    pack,
                    dry_run: session.dry_run(),
                    options: session.options(),
                })
                .await
        }
    }
}

/// `ok <dst>` only when the server marked that ref ok and the push as a whole
/// succeeded, else `error <dst> <msg>`
fn status_line(result: &PushPackResult, directive: &PushDirective) -> String {
    let ref_result: Option<&RefResult> = result.results.get(&directive.dst);
    if result.ok && ref_result.is_some_and(RefResult::is_ok) {
        return format!("ok {}", directive.dst);
    }

    let message = ref_result
        .and_then(|r| r.message.as_deref())
        .or(result.message.as_deref())
        .filter(|m| !m.is_empty())
        .unwrap_or("push failed");
    format!("error {} {}", directive.dst, single_line(message))
}

/// Protocol replies are line-framed
fn single_line(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}
