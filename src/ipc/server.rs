//! Socket server: accepts clients until cancellation, one roundtrip each.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Request, Response};

/// Processes one IPC command request.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Response;
}

/// Accepts unix-socket clients until `cancel` fires. Cancellation closes the
/// listener; in-flight connections complete their single roundtrip.
pub async fn serve(
    listener: UnixListener,
    handler: Arc<dyn Handler>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&handler);
                        connections.spawn(handle_connection(stream, handler));
                    }
                    Err(err) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        return Err(err).context("accept IPC connection");
                    }
                }
            }
        }
    }

    drop(listener);
    while let Some(joined) = connections.join_next().await {
        if let Err(err) = joined {
            debug!(error = %err, "IPC connection task failed");
        }
    }
    Ok(())
}

async fn handle_connection(stream: UnixStream, handler: Arc<dyn Handler>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let response = match reader.read_line(&mut line).await {
        Ok(0) => error_response("read request: connection closed before newline"),
        Ok(_) => match serde_json::from_str::<Request>(&line) {
            Ok(request) => handler.handle(request).await,
            Err(err) => error_response(&format!("decode request: {err}")),
        },
        Err(err) => error_response(&format!("read request: {err}")),
    };

    let mut payload =
        serde_json::to_vec(&response).unwrap_or_else(|_| br#"{"ok":false}"#.to_vec());
    payload.push(b'\n');
    let _ = write_half.write_all(&payload).await;
}

fn error_response(message: &str) -> Response {
    Response {
        ok: false,
        error: Some(message.to_string()),
        ..Response::default()
    }
}
