use clap::Parser;
use sotto::app;
use sotto::cli::Cli;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let exit_code = app::run(cli, cancel).await;
    std::process::exit(exit_code);
}

/// SIGINT/SIGTERM cancel the session context instead of killing the process
/// outright, so the owner can tear down its socket and indicator.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(_) => return,
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        cancel.cancel();
    });
}
