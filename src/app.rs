//! Top-level command dispatch for one process invocation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::CommandFactory;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audio::{AudioBackend, CpalBackend};
use crate::cli::{Cli, Command};
use crate::config::{self, Config};
use crate::doctor;
use crate::indicator::Notifier;
use crate::ipc::{self, AlreadyRunning, Request, Response};
use crate::logging;
use crate::output::OutputCommitter;
use crate::pipeline::PipelineTranscriber;
use crate::session::{Controller, RunResult};
use crate::version;

const FORWARD_TIMEOUT: Duration = Duration::from_millis(220);
const ACQUIRE_PROBE_TIMEOUT: Duration = Duration::from_millis(180);
const ACQUIRE_RETRIES: u32 = 8;

/// How one forward attempt to an existing owner resolved.
enum Forward {
    /// An owner answered; `Err` carries an `ok:false` or transport failure.
    Handled(Result<Response, anyhow::Error>),
    /// No owner is listening.
    NoOwner,
}

/// Parses nothing further: dispatches one already-parsed CLI invocation and
/// returns the process exit code.
pub async fn run(cli: Cli, cancel: CancellationToken) -> i32 {
    if cli.version || cli.command == Some(Command::Version) {
        println!("{}", version::string());
        return 0;
    }

    let command = match cli.command {
        Some(command) => command,
        None => {
            let _ = Cli::command().print_help();
            return 0;
        }
    };

    let log_runtime = match logging::init() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: setup logging: {err:#}");
            return 1;
        }
    };

    let loaded = match config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err:#}");
            error!(error = %format!("{err:#}"), "load config failed");
            return 1;
        }
    };
    for warning in &loaded.warnings {
        match warning.line {
            Some(line) => eprintln!("warning: line {line}: {}", warning.message),
            None => eprintln!("warning: {}", warning.message),
        }
        warn!(line = warning.line, message = %warning.message, "config warning");
    }

    info!(
        command = command.as_str(),
        config = %loaded.path.display(),
        log = %log_runtime.path.display(),
        "command start"
    );

    match command {
        Command::Doctor => {
            let backend = CpalBackend::new();
            let report = doctor::run(&loaded, &backend).await;
            println!("{report}");
            if report.ok() {
                0
            } else {
                1
            }
        }
        Command::Devices => command_devices().await,
        Command::Status => command_status().await,
        Command::Stop => forward_or_fail("stop").await,
        Command::Cancel => forward_or_fail("cancel").await,
        Command::Toggle => command_toggle(loaded.config, cancel).await,
        Command::Version => unreachable!("version handled before dispatch"),
    }
}

/// Prints discovered input devices and key availability metadata.
async fn command_devices() -> i32 {
    let backend = CpalBackend::new();
    let devices = match backend.list_devices().await {
        Ok(devices) => devices,
        Err(err) => {
            eprintln!("error: {err:#}");
            return 1;
        }
    };
    if devices.is_empty() {
        println!("no audio devices found");
        return 1;
    }

    for device in devices {
        println!(
            "{} id={} | description={:?} | state={} | available={} | muted={}",
            if device.default { "*" } else { " " },
            device.id,
            device.description,
            device.state,
            if device.available { "yes" } else { "no" },
            if device.muted { "yes" } else { "no" },
        );
    }
    0
}

/// Queries the active owner (if any) and prints session state.
async fn command_status() -> i32 {
    let socket_path = match ipc::runtime_socket_path() {
        Ok(path) => path,
        Err(_) => {
            println!("idle");
            return 0;
        }
    };

    match try_forward(&socket_path, "status").await {
        Forward::Handled(Ok(response)) => {
            let state = response.state.unwrap_or_default();
            if state.is_empty() {
                println!("idle");
            } else {
                println!("{state}");
            }
            0
        }
        Forward::Handled(Err(err)) => {
            eprintln!("error: {err:#}");
            1
        }
        Forward::NoOwner => {
            println!("idle");
            0
        }
    }
}

/// Forwards a command to the active owner; fails when no owner exists.
async fn forward_or_fail(command: &str) -> i32 {
    let socket_path = match ipc::runtime_socket_path() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err:#}");
            return 1;
        }
    };

    match try_forward(&socket_path, command).await {
        Forward::NoOwner => {
            eprintln!("error: no active sotto session");
            1
        }
        Forward::Handled(Err(err)) => {
            eprintln!("error: {err:#}");
            1
        }
        Forward::Handled(Ok(response)) => {
            if let Some(message) = response.message {
                if !message.is_empty() {
                    println!("{message}");
                }
            }
            0
        }
    }
}

/// Starts a new owner session, or forwards toggle to an existing owner.
async fn command_toggle(cfg: Config, cancel: CancellationToken) -> i32 {
    let socket_path = match ipc::runtime_socket_path() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("error: {err:#}");
            return 1;
        }
    };

    match try_forward(&socket_path, "toggle").await {
        Forward::Handled(Ok(response)) => {
            print_message(&response);
            return 0;
        }
        Forward::Handled(Err(err)) => {
            eprintln!("error: {err:#}");
            return 1;
        }
        Forward::NoOwner => {}
    }

    let listener =
        match ipc::acquire(&socket_path, ACQUIRE_PROBE_TIMEOUT, ACQUIRE_RETRIES, None).await {
            Ok(listener) => listener,
            Err(err) if err.is::<AlreadyRunning>() => {
                // Lost the acquire race; the winner handles the toggle.
                return match try_forward(&socket_path, "toggle").await {
                    Forward::Handled(Ok(response)) => {
                        print_message(&response);
                        0
                    }
                    Forward::Handled(Err(forward_err)) => {
                        eprintln!("error: {forward_err:#}");
                        1
                    }
                    Forward::NoOwner => 0,
                };
            }
            Err(err) => {
                eprintln!("error: {err:#}");
                return 1;
            }
        };

    let backend: Arc<dyn AudioBackend> = Arc::new(CpalBackend::new());
    let transcriber = Box::new(PipelineTranscriber::new(cfg.clone(), backend));
    let committer = Box::new(OutputCommitter::new(cfg.clone()));
    let indicator = Box::new(Notifier::new(cfg.indicator.clone()));
    let controller = Arc::new(Controller::new(transcriber, committer, indicator));

    let server_cancel = CancellationToken::new();
    let server_task = {
        let handler: Arc<dyn ipc::Handler> = Arc::clone(&controller) as Arc<dyn ipc::Handler>;
        tokio::spawn(ipc::serve(listener, handler, server_cancel.clone()))
    };

    let result = controller.run(cancel).await;
    server_cancel.cancel();
    let server_outcome = server_task.await;

    remove_socket(&socket_path);

    match server_outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            eprintln!("error: ipc server failed: {err:#}");
            return 1;
        }
        Err(err) => {
            eprintln!("error: ipc server failed: {err}");
            return 1;
        }
    }

    log_session_result(&result);

    if result.cancelled {
        println!("cancelled");
        return 0;
    }
    if let Some(err) = result.err {
        eprintln!("error: {err:#}");
        return 1;
    }
    let transcript = result.transcript.trim();
    if !transcript.is_empty() {
        println!("{transcript}");
    }
    0
}

fn print_message(response: &Response) {
    if let Some(message) = &response.message {
        if !message.is_empty() {
            println!("{message}");
        }
    }
}

fn remove_socket(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %err, path = %path.display(), "remove owner socket failed");
        }
    }
}

/// Attempts to send a command to an existing owner and classifies the
/// outcome.
async fn try_forward(socket_path: &Path, command: &str) -> Forward {
    match ipc::send(socket_path, &Request::new(command), FORWARD_TIMEOUT).await {
        Ok(response) if response.ok => Forward::Handled(Ok(response)),
        Ok(response) => {
            let message = response.error.unwrap_or_else(|| "request refused".to_string());
            Forward::Handled(Err(anyhow!(message)))
        }
        Err(err) if err.means_no_owner() => Forward::NoOwner,
        Err(err) => Forward::Handled(Err(anyhow!(err).context(format!(
            "forward command {command:?}"
        )))),
    }
}

/// Writes normalized session metrics into the runtime logger.
fn log_session_result(result: &RunResult) {
    let duration_ms = result
        .finished_at
        .signed_duration_since(result.started_at)
        .num_milliseconds();

    if let Some(err) = &result.err {
        error!(
            state = %result.state,
            cancelled = result.cancelled,
            started_at = %result.started_at.to_rfc3339(),
            finished_at = %result.finished_at.to_rfc3339(),
            duration_ms,
            audio_device = %result.audio_device,
            bytes_captured = result.bytes_captured,
            transcript_length = result.transcript.len(),
            grpc_latency_ms = result.grpc_latency.as_millis() as u64,
            focused_monitor = %result.focused_monitor,
            error = %format!("{err:#}"),
            "session failed"
        );
        return;
    }

    info!(
        state = %result.state,
        cancelled = result.cancelled,
        started_at = %result.started_at.to_rfc3339(),
        finished_at = %result.finished_at.to_rfc3339(),
        duration_ms,
        audio_device = %result.audio_device,
        bytes_captured = result.bytes_captured,
        transcript_length = result.transcript.len(),
        grpc_latency_ms = result.grpc_latency.as_millis() as u64,
        focused_monitor = %result.focused_monitor,
        "session complete"
    );
}
