//! Visual state notifications and audio cue playback.

mod cues;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::IndicatorConfig;
use crate::hypr;
use crate::session::Indicator;

const DISPATCH_TIMEOUT: Duration = Duration::from_millis(400);
const RECORDING_COLOR: &str = "rgb(89b4fa)";
const TRANSCRIBING_COLOR: &str = "rgb(cba6f7)";
const ERROR_COLOR: &str = "rgb(f38ba8)";
const STICKY_TIMEOUT_MS: i32 = 300_000;

struct Messages {
    recording: &'static str,
    processing: &'static str,
    error_text: &'static str,
}

fn messages_from_env() -> Messages {
    // Only English strings ship today; the LANG hook keeps the lookup in one
    // place for when that changes.
    let _lang = std::env::var("LANG").unwrap_or_default();
    Messages {
        recording: "Recording…",
        processing: "Transcribing…",
        error_text: "Speech recognition error",
    }
}

/// Runtime indicator routing through Hyprland or desktop notifications.
pub struct Notifier {
    cfg: IndicatorConfig,
    messages: Messages,
    focused_monitor: Mutex<String>,
    desktop_notification_id: Mutex<u32>,
    cue_lock: Arc<Mutex<()>>,
}

impl Notifier {
    pub fn new(cfg: IndicatorConfig) -> Self {
        Notifier {
            cfg,
            messages: messages_from_env(),
            focused_monitor: Mutex::new(String::new()),
            desktop_notification_id: Mutex::new(0),
            cue_lock: Arc::new(Mutex::new(())),
        }
    }

    fn play_cue(&self, cue: cues::Cue) {
        if !self.cfg.sound_enable {
            return;
        }
        cues::play(cue, Arc::clone(&self.cue_lock));
    }

    /// Resolves and caches the focused monitor once per session.
    async fn ensure_focused_monitor(&self) {
        {
            let focused = self.focused_monitor.lock().expect("monitor lock");
            if !focused.is_empty() {
                return;
            }
        }
        match self.bounded(hypr::query_focused_monitor()).await {
            Ok(monitor) => {
                *self.focused_monitor.lock().expect("monitor lock") = monitor;
            }
            Err(err) => debug!(error = %err, "indicator focused monitor query failed"),
        }
    }

    /// Dispatches indicator output through the configured backend.
    async fn notify(&self, icon: i32, timeout_ms: i32, color: &str, text: &str) {
        let outcome = if self.desktop_backend() {
            self.bounded(self.notify_desktop(timeout_ms, text)).await
        } else {
            self.bounded(hypr::notify(icon, timeout_ms, color, text))
                .await
        };
        if let Err(err) = outcome {
            debug!(error = %err, "indicator dispatch failed");
        }
    }

    fn desktop_backend(&self) -> bool {
        self.cfg.backend.trim().eq_ignore_ascii_case("desktop")
    }

    /// Bounds one indicator operation so session flow never stalls on it.
    async fn bounded<T>(
        &self,
        op: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(DISPATCH_TIMEOUT, op).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "indicator dispatch timed out after {DISPATCH_TIMEOUT:?}"
            )),
        }
    }

    /// Sends a replaceable desktop notification over DBus and records its ID.
    async fn notify_desktop(&self, timeout_ms: i32, text: &str) -> Result<()> {
        let replace_id = *self
            .desktop_notification_id
            .lock()
            .expect("notification id lock");
        let app_name = {
            let trimmed = self.cfg.desktop_app_name.trim();
            if trimmed.is_empty() {
                "sotto-indicator"
            } else {
                trimmed
            }
            .to_string()
        };

        let id = desktop_notify(&app_name, replace_id, text, timeout_ms).await?;
        *self
            .desktop_notification_id
            .lock()
            .expect("notification id lock") = id;
        Ok(())
    }

    async fn dismiss_desktop(&self) -> Result<()> {
        let id = {
            let mut guard = self
                .desktop_notification_id
                .lock()
                .expect("notification id lock");
            std::mem::take(&mut *guard)
        };
        if id == 0 {
            return Ok(());
        }
        desktop_dismiss(id).await
    }
}

#[async_trait]
impl Indicator for Notifier {
    async fn show_recording(&self) {
        self.play_cue(cues::Cue::Start);
        if !self.cfg.enable {
            return;
        }
        self.ensure_focused_monitor().await;
        self.notify(1, STICKY_TIMEOUT_MS, RECORDING_COLOR, self.messages.recording)
            .await;
    }

    async fn show_transcribing(&self) {
        if !self.cfg.enable {
            return;
        }
        self.notify(
            1,
            STICKY_TIMEOUT_MS,
            TRANSCRIBING_COLOR,
            self.messages.processing,
        )
        .await;
    }

    async fn show_error(&self, text: &str) {
        if !self.cfg.enable {
            return;
        }
        let text = if text.is_empty() {
            self.messages.error_text
        } else {
            text
        };
        let timeout = if self.cfg.error_timeout_ms <= 0 {
            1200
        } else {
            self.cfg.error_timeout_ms
        };
        self.notify(3, timeout, ERROR_COLOR, text).await;
    }

    fn cue_stop(&self) {
        self.play_cue(cues::Cue::Stop);
    }

    fn cue_complete(&self) {
        self.play_cue(cues::Cue::Complete);
    }

    fn cue_cancel(&self) {
        self.play_cue(cues::Cue::Cancel);
    }

    async fn hide(&self) {
        if !self.cfg.enable {
            return;
        }
        let outcome = if self.desktop_backend() {
            self.bounded(self.dismiss_desktop()).await
        } else {
            self.bounded(hypr::dismiss_notify()).await
        };
        if let Err(err) = outcome {
            debug!(error = %err, "indicator dismiss failed");
        }
    }

    fn focused_monitor(&self) -> String {
        self.focused_monitor.lock().expect("monitor lock").clone()
    }
}

/// Sends a freedesktop notification over DBus via busctl and returns the
/// notification ID assigned by the server.
async fn desktop_notify(
    app_name: &str,
    replace_id: u32,
    summary: &str,
    timeout_ms: i32,
) -> Result<u32> {
    let replace = replace_id.to_string();
    let timeout = timeout_ms.to_string();
    let args = [
        "--user",
        "call",
        "org.freedesktop.Notifications",
        "/org/freedesktop/Notifications",
        "org.freedesktop.Notifications",
        "Notify",
        "susssasa{sv}i",
        app_name,
        &replace,
        "",
        summary,
        "",
        "0",
        "0",
        &timeout,
    ];

    let output = Command::new("busctl").args(args).output().await?;
    if !output.status.success() {
        let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if detail.is_empty() {
            anyhow::bail!("desktop notify failed: {}", output.status);
        }
        anyhow::bail!("desktop notify failed: {} ({detail})", output.status);
    }

    parse_notify_reply(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the `u <id>` reply printed by busctl.
fn parse_notify_reply(stdout: &str) -> Result<u32> {
    let mut fields = stdout.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some("u"), Some(id)) => id
            .parse::<u32>()
            .map_err(|err| anyhow::anyhow!("desktop notify parse id {id:?}: {err}")),
        _ => anyhow::bail!("desktop notify invalid response: {stdout:?}"),
    }
}

async fn desktop_dismiss(id: u32) -> Result<()> {
    let id = id.to_string();
    let args = [
        "--user",
        "call",
        "org.freedesktop.Notifications",
        "/org/freedesktop/Notifications",
        "org.freedesktop.Notifications",
        "CloseNotification",
        "u",
        &id,
    ];
    let output = Command::new("busctl").args(args).output().await?;
    if !output.status.success() {
        anyhow::bail!("desktop dismiss failed: {}", output.status);
    }
    Ok(())
}
