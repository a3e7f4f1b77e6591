//! Single-instance socket acquisition with stale-socket recovery.

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, warn};

use super::client;

/// A responsive owner already holds the socket.
#[derive(Debug, Error)]
#[error("sotto session already running")]
pub struct AlreadyRunning;

/// Optional hook invoked between stale-socket removal and the bind retry,
/// e.g. a compositor submap reset.
pub type Rescue<'a> = &'a (dyn Fn() + Send + Sync);

/// Resolves the well-known owner socket path under `XDG_RUNTIME_DIR`.
pub fn runtime_socket_path() -> Result<PathBuf> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_default();
    let runtime_dir = runtime_dir.trim();
    if runtime_dir.is_empty() {
        bail!("XDG_RUNTIME_DIR is not set");
    }
    Ok(PathBuf::from(runtime_dir).join("sotto.sock"))
}

/// Binds the owner socket at `path`, reclaiming stale sockets.
///
/// On address-in-use the existing listener is probed: a responsive owner
/// yields [`AlreadyRunning`]; an unresponsive path is removed and the bind is
/// retried up to `retries` times with a `25ms × (attempt+1)` backoff. The path
/// is never deleted while the existing listener responds.
pub async fn acquire(
    path: &Path,
    probe_timeout: Duration,
    retries: u32,
    rescue: Option<Rescue<'_>>,
) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(parent)
            .with_context(|| format!("ensure runtime socket dir {}", parent.display()))?;
    }

    for attempt in 0..=retries {
        match UnixListener::bind(path) {
            Ok(listener) => {
                if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
                    warn!(error = %err, path = %path.display(), "chmod owner socket failed");
                }
                return Ok(listener);
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                match client::probe(path, probe_timeout).await {
                    Ok(true) => return Err(AlreadyRunning.into()),
                    Ok(false) => {}
                    Err(probe_err) => {
                        return Err(anyhow!(probe_err)
                            .context(format!("probe existing socket {}", path.display())));
                    }
                }

                debug!(path = %path.display(), attempt, "removing stale owner socket");
                match fs::remove_file(path) {
                    Ok(()) => {}
                    Err(remove_err) if remove_err.kind() == io::ErrorKind::NotFound => {}
                    Err(remove_err) => {
                        return Err(anyhow!(remove_err)
                            .context(format!("remove stale socket {}", path.display())));
                    }
                }

                if let Some(rescue) = rescue {
                    rescue();
                }

                if attempt < retries {
                    tokio::time::sleep(Duration::from_millis(25 * (u64::from(attempt) + 1))).await;
                }
            }
            Err(err) => {
                return Err(anyhow!(err).context(format!("listen unix {}", path.display())));
            }
        }
    }

    bail!(
        "failed to acquire socket {} after {retries} retries",
        path.display()
    )
}
