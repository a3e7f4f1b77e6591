// Integration tests for the unix-socket IPC layer: request/response
// roundtrips, liveness probing, and single-instance socket acquisition.

use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use sotto::ipc::{self, Request, Response};

struct StaticHandler {
    state: &'static str,
}

#[async_trait]
impl ipc::Handler for StaticHandler {
    async fn handle(&self, request: Request) -> Response {
        match request.command.as_str() {
            "status" => Response {
                ok: true,
                state: Some(self.state.to_string()),
                message: Some("status".to_string()),
                error: None,
            },
            other => Response {
                ok: false,
                state: Some(self.state.to_string()),
                message: None,
                error: Some(format!("unknown command: {other}")),
            },
        }
    }
}

fn socket_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("sotto.sock")
}

async fn spawn_owner(
    path: &std::path::Path,
    state: &'static str,
) -> (CancellationToken, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let listener = UnixListener::bind(path).expect("bind test socket");
    let cancel = CancellationToken::new();
    let task = tokio::spawn(ipc::serve(
        listener,
        Arc::new(StaticHandler { state }),
        cancel.clone(),
    ));
    (cancel, task)
}

#[tokio::test]
async fn forward_status_to_active_owner() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "recording").await;

    let response = ipc::send(
        &path,
        &Request::new("status"),
        Duration::from_millis(200),
    )
    .await
    .expect("roundtrip");
    assert!(response.ok);
    assert_eq!(response.state.as_deref(), Some("recording"));

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_command_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "idle").await;

    let response = ipc::send(&path, &Request::new("warble"), Duration::from_millis(200))
        .await
        .expect("roundtrip");
    assert!(!response.ok);
    assert_eq!(response.error.as_deref(), Some("unknown command: warble"));

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_request_yields_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "idle").await;

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream.write_all(b"this is not json\n").await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();

    let response: Response = serde_json::from_str(&line).unwrap();
    assert!(!response.ok);
    assert!(response.error.unwrap().starts_with("decode request:"));

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn concurrent_connections_each_get_one_response() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "recording").await;

    let mut clients = Vec::new();
    for _ in 0..8 {
        let path = path.clone();
        clients.push(tokio::spawn(async move {
            ipc::send(&path, &Request::new("status"), Duration::from_millis(500)).await
        }));
    }
    for client in clients {
        let response = client.await.unwrap().expect("roundtrip");
        assert_eq!(response.state.as_deref(), Some("recording"));
    }

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_reports_live_owner() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "idle").await;

    assert!(ipc::probe(&path, Duration::from_millis(200)).await.unwrap());

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_reports_missing_socket_as_not_alive() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    assert!(!ipc::probe(&path, Duration::from_millis(200)).await.unwrap());
}

#[tokio::test]
async fn probe_reports_dead_socket_as_not_alive() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    // Bind then drop: the socket file stays behind with nothing listening.
    drop(UnixListener::bind(&path).unwrap());
    assert!(path.exists());
    assert!(!ipc::probe(&path, Duration::from_millis(200)).await.unwrap());
}

#[tokio::test]
async fn acquire_binds_fresh_path_with_restrictive_mode() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);

    let listener = ipc::acquire(&path, Duration::from_millis(50), 2, None)
        .await
        .expect("acquire");
    assert!(path.exists());
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    drop(listener);
}

#[tokio::test]
async fn acquire_reclaims_stale_regular_file_and_calls_rescue() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    std::fs::write(&path, b"stale").unwrap();

    let rescues = AtomicUsize::new(0);
    let rescue = || {
        rescues.fetch_add(1, Ordering::SeqCst);
    };

    let listener = ipc::acquire(&path, Duration::from_millis(50), 2, Some(&rescue))
        .await
        .expect("acquire over stale file");

    assert!(rescues.load(Ordering::SeqCst) >= 1);
    assert!(path.exists());
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    drop(listener);
}

#[tokio::test]
async fn acquire_reclaims_stale_socket_file() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    drop(UnixListener::bind(&path).unwrap());

    let listener = ipc::acquire(&path, Duration::from_millis(50), 2, None)
        .await
        .expect("acquire over dead socket");
    assert!(path.exists());
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    drop(listener);
}

#[tokio::test]
async fn acquire_refuses_when_owner_is_responsive() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    let (cancel, server) = spawn_owner(&path, "recording").await;

    let err = ipc::acquire(&path, Duration::from_millis(200), 1, None)
        .await
        .expect_err("owner is alive");
    assert!(err.is::<ipc::AlreadyRunning>());
    // The live owner's socket must not be touched.
    assert!(path.exists());
    assert!(ipc::probe(&path, Duration::from_millis(200)).await.unwrap());

    cancel.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn send_times_out_when_owner_never_replies() {
    let dir = TempDir::new().unwrap();
    let path = socket_path(&dir);
    // A listener that accepts but never responds.
    let listener = UnixListener::bind(&path).unwrap();
    let hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let err = ipc::send(&path, &Request::new("status"), Duration::from_millis(100))
        .await
        .expect_err("no response");
    assert!(matches!(err, ipc::SendError::Timeout(_)));

    hold.abort();
}
