//! Transcript commit side effects: clipboard and optional paste.

mod paste;

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::error;

use crate::config::Config;
use crate::session::Committer;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_PASTE_TIMEOUT: Duration = Duration::from_millis(1200);

/// Applies transcript output side effects (clipboard + optional paste).
pub struct OutputCommitter {
    cfg: Config,
}

impl OutputCommitter {
    pub fn new(cfg: Config) -> Self {
        OutputCommitter { cfg }
    }

    /// Paste errors are logged, never surfaced: the clipboard is already set.
    fn log_paste_failure(&self, err: anyhow::Error) {
        error!(error = %format!("{err:#}"), "paste dispatch failed; clipboard remains set");
    }
}

#[async_trait]
impl Committer for OutputCommitter {
    async fn commit(&self, transcript: &str) -> Result<()> {
        if transcript.is_empty() {
            return Ok(());
        }

        run_command_with_input(
            &self.cfg.clipboard.argv,
            Some(transcript),
            COMMAND_TIMEOUT,
        )
        .await
        .context("set clipboard")?;

        if !self.cfg.paste.enable {
            return Ok(());
        }

        if !self.cfg.paste_cmd.argv.is_empty() {
            if let Err(err) =
                run_command_with_input(&self.cfg.paste_cmd.argv, None, COMMAND_TIMEOUT).await
            {
                self.log_paste_failure(err);
            }
            return Ok(());
        }

        let dispatch = paste::default_paste(&self.cfg.paste.shortcut);
        match tokio::time::timeout(DEFAULT_PASTE_TIMEOUT, dispatch).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.log_paste_failure(err),
            Err(_) => self.log_paste_failure(anyhow::anyhow!(
                "paste timed out after {DEFAULT_PASTE_TIMEOUT:?}"
            )),
        }
        Ok(())
    }
}

/// Executes argv with `input` written to stdin, bounded by `timeout`.
async fn run_command_with_input(
    argv: &[String],
    input: Option<&str>,
    timeout: Duration,
) -> Result<()> {
    let (program, args) = match argv.split_first() {
        Some(split) => split,
        None => bail!("command argv cannot be empty"),
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("start command {program}"))?;

    let run = async {
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(input) = input {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .with_context(|| format!("write stdin for {program}"))?;
            }
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("wait for {program}"))?;
        if !status.success() {
            bail!("command {program} exited with {status}");
        }
        Ok(())
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(result) => result,
        Err(_) => bail!("command {program} timed out after {timeout:?}"),
    }
}
