use tokio::io::AsyncWrite;

use super::write_line;
use crate::{error::Result, session::Session};

/// Record a helper option. Every option is acknowledged with `ok`.
pub async fn handle<W: AsyncWrite + Unpin>(
    session: &mut Session,
    output: &mut W,
    name: &str,
    value: &str,
) -> Result<()> {
    tracing::debug!("option {} = {}", name, value);
    session.set_option(name, value);
    write_line(output, "ok").await
}
