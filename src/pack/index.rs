//! Materialise fetched packs with `git index-pack`

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    client::FetchPackResult,
    error::{Error, Result},
};

/// Destination for a fetched pack
#[async_trait]
pub trait PackSink: Send + Sync {
    async fn index(&self, pack: FetchPackResult, progress: bool) -> Result<()>;
}

/// Pipes the pack into `git index-pack --stdin --fix-thin` in the current repository
pub struct GitIndexPack {
    git: PathBuf,
}

impl GitIndexPack {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl PackSink for GitIndexPack {
    async fn index(&self, pack: FetchPackResult, progress: bool) -> Result<()> {
        let mut cmd = Command::new(&self.git);
        cmd.arg("index-pack").arg("--stdin").arg("--fix-thin");
        if let Some(keep) = &pack.keep {
            cmd.arg(format!("--keep={}", keep));
        }

        // stdout is the protocol channel, so index-pack's own stdout is captured
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Subprocess(format!("failed to spawn git index-pack: {}", e)))?;

        let bar = progress.then(|| progress_bar(pack.size_hint));

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Subprocess("git index-pack stdin unavailable".to_string()))?;

        let mut stream = pack.payload.into_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = child.kill().await;
                    return Err(e);
                }
            };
            if let Err(e) = stdin.write_all(&chunk).await {
                // index-pack exited early; its status says more than the broken pipe
                tracing::debug!("write to git index-pack failed: {}", e);
                break;
            }
            written += chunk.len() as u64;
            if let Some(bar) = &bar {
                bar.set_position(written);
            }
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Subprocess(format!("failed to wait for git index-pack: {}", e)))?;

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        if !output.status.success() {
            return Err(Error::Subprocess(format!(
                "git index-pack failed with status: {}",
                output.status
            )));
        }

        tracing::info!(
            "git index-pack: {} ({} bytes)",
            String::from_utf8_lossy(&output.stdout).trim(),
            written
        );
        Ok(())
    }
}

fn progress_bar(size_hint: Option<u64>) -> ProgressBar {
    match size_hint {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                bar.set_style(style.progress_chars("█▓░"));
            }
            bar.set_message("Receiving pack");
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_message("Receiving pack");
            bar
        }
    }
}
