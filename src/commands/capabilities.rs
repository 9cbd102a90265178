use tokio::io::AsyncWrite;

use super::write_line;
use crate::error::Result;

/// Handle the capabilities command
/// Output the capabilities this remote helper supports
pub async fn handle<W: AsyncWrite + Unpin>(output: &mut W) -> Result<()> {
    for capability in ["fetch", "push", "option", "list"] {
        write_line(output, capability).await?;
    }
    write_line(output, "").await?; // Empty line signals completion

    Ok(())
}
