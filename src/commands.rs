pub mod capabilities;
pub mod fetch;
pub mod list;
pub mod option;
pub mod push;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Write one protocol line; an empty `line` writes the blank terminator
pub(crate) async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    Ok(())
}
