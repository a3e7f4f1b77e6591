//! Runtime JSONL logging under the XDG state directory.

use std::fs;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Where the active logger writes, for "command start" diagnostics.
pub struct LogRuntime {
    pub path: PathBuf,
}

/// Installs a JSON-lines logger appending to `<state_dir>/sotto/log.jsonl`.
pub fn init() -> Result<LogRuntime> {
    let dir = state_dir()?.join("sotto");
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&dir)
        .with_context(|| format!("create log dir {}", dir.display()))?;

    let path = dir.join("log.jsonl");
    let file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))?;

    Ok(LogRuntime { path })
}

/// `XDG_STATE_HOME` when set, otherwise `~/.local/state`.
pub fn state_dir() -> Result<PathBuf> {
    let xdg = std::env::var("XDG_STATE_HOME").unwrap_or_default();
    let xdg = xdg.trim();
    if !xdg.is_empty() {
        return Ok(PathBuf::from(xdg));
    }
    let home = dirs::home_dir().context("resolve home directory for state")?;
    Ok(home.join(".local").join("state"))
}
