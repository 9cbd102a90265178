mod command;
mod reader;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub use command::{Command, FetchDirective};
pub use reader::LineReader;

use crate::{client::PushDirective, commands, error::Result, pack::PackPayload, session::Session};

/// Directives collected since the last blank line
#[derive(Debug, Default)]
enum Batch {
    #[default]
    Idle,
    Fetch(Vec<FetchDirective>),
    Push(Vec<PushDirective>),
}

/// Main protocol handler - reads commands from `input` and dispatches them.
///
/// Returns at end of input, at a blank line with no batch pending, or after the
/// first push batch: everything after a push batch's blank line is pack data.
pub async fn handle_commands<R, W>(session: &mut Session, input: R, output: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = LineReader::new(input);
    let mut batch = Batch::Idle;

    while let Some(line) = reader.next_line().await? {
        session.observe(line.split_whitespace());
        tracing::debug!("received command: {}", line);

        match Command::parse(&line) {
            Command::Blank => match std::mem::take(&mut batch) {
                Batch::Idle => break,
                Batch::Fetch(directives) => {
                    commands::fetch::handle(session, output, &directives).await?;
                }
                Batch::Push(directives) => {
                    let pack = reader.read_remaining().await?;
                    flush_push(session, output, &directives, pack).await?;
                    break;
                }
            },
            Command::Capabilities => commands::capabilities::handle(output).await?,
            Command::Option { name, value } => {
                commands::option::handle(session, output, &name, &value).await?;
            }
            Command::List { for_push } => commands::list::handle(session, output, for_push).await?,
            Command::Fetch(None) => tracing::warn!("ignoring malformed fetch: {}", line),
            Command::Fetch(Some(directive)) => match batch {
                Batch::Idle => batch = Batch::Fetch(vec![directive]),
                Batch::Fetch(ref mut directives) => directives.push(directive),
                Batch::Push(_) => tracing::warn!("ignoring fetch inside a push batch: {}", line),
            },
            Command::Push(directive) => {
                if let Batch::Idle = batch {
                    batch = Batch::Push(Vec::new());
                }
                match batch {
                    Batch::Push(ref mut directives) => match directive {
                        Ok(directive) => directives.push(directive),
                        Err(e) => tracing::debug!("dropping push directive: {}", e),
                    },
                    _ => tracing::warn!("ignoring push inside a fetch batch: {}", line),
                }
            }
            Command::Unknown(cmd) => {
                tracing::warn!("unknown command: {}", cmd);
            }
        }

        output.flush().await?;
    }

    // End of input still flushes a pending batch
    match batch {
        Batch::Idle => {}
        Batch::Fetch(directives) => commands::fetch::handle(session, output, &directives).await?,
        Batch::Push(directives) => {
            flush_push(session, output, &directives, Bytes::new()).await?;
        }
    }

    output.flush().await?;
    Ok(())
}

async fn flush_push<W: AsyncWrite + Unpin>(
    session: &Session,
    output: &mut W,
    directives: &[PushDirective],
    pack: Bytes,
) -> Result<()> {
    if directives.is_empty() {
        tracing::debug!("no valid push directives in batch");
        return commands::write_line(output, "").await;
    }
    commands::push::handle(session, output, directives, PackPayload::InMemory(pack)).await
}
