//! Socket client: one request/response roundtrip per connection.

use std::io;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::{Request, Response};

/// Classified roundtrip failure. Missing-socket and refused-connection are
/// distinct kinds so callers can treat "no owner" differently from real
/// failures.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("socket missing: {0}")]
    SocketMissing(#[source] io::Error),
    #[error("connection refused: {0}")]
    ConnectionRefused(#[source] io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SendError {
    /// True when the failure means no owner is listening at the path.
    pub fn means_no_owner(&self) -> bool {
        matches!(
            self,
            SendError::SocketMissing(_) | SendError::ConnectionRefused(_)
        )
    }
}

/// Opens a unix-socket request/response roundtrip bounded by `timeout`, which
/// covers connect, write, and read.
pub async fn send(
    path: &Path,
    request: &Request,
    timeout: Duration,
) -> Result<Response, SendError> {
    let roundtrip = async {
        let mut stream = UnixStream::connect(path).await.map_err(classify_connect)?;

        let mut line = serde_json::to_vec(request).map_err(SendError::Encode)?;
        line.push(b'\n');
        stream.write_all(&line).await?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;
        serde_json::from_str(&response_line).map_err(SendError::Decode)
    };

    tokio::time::timeout(timeout, roundtrip)
        .await
        .map_err(|_| SendError::Timeout(timeout))?
}

/// Checks whether a responsive owner is currently listening on `path`.
///
/// Any decoded response counts as alive; a missing socket or refused
/// connection counts as not alive; everything else is an error.
pub async fn probe(path: &Path, timeout: Duration) -> Result<bool, SendError> {
    match send(path, &Request::new("status"), timeout).await {
        Ok(_) => Ok(true),
        Err(err) if err.means_no_owner() => Ok(false),
        Err(err) => Err(err),
    }
}

fn classify_connect(err: io::Error) -> SendError {
    match err.kind() {
        io::ErrorKind::NotFound => SendError::SocketMissing(err),
        io::ErrorKind::ConnectionRefused => SendError::ConnectionRefused(err),
        _ => SendError::Io(err),
    }
}
