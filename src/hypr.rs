//! Hyprland integration through `hyprctl`: queries, notifications, shortcuts.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::process::Command;

/// Fields needed for paste dispatch targeting.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveWindow {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub class: String,
    #[serde(default, rename = "initialClass")]
    pub initial_class: String,
}

#[derive(Debug, Deserialize)]
struct Monitor {
    #[serde(default)]
    name: String,
    #[serde(default)]
    focused: bool,
}

/// Fetches and validates the active-window contract from hyprctl.
pub async fn query_active_window() -> Result<ActiveWindow> {
    let output = run_hyprctl_output(&["-j", "activewindow"]).await?;
    decode_active_window(&output)
}

fn decode_active_window(payload: &[u8]) -> Result<ActiveWindow> {
    let mut window: ActiveWindow =
        serde_json::from_slice(payload).context("decode hyprctl activewindow json")?;
    window.address = window.address.trim().to_string();
    window.class = window.class.trim().to_string();
    window.initial_class = window.initial_class.trim().to_string();
    if window.address.is_empty() {
        bail!("hyprctl activewindow returned empty address");
    }
    Ok(window)
}

/// Returns the focused monitor name, or the first monitor as a fallback.
pub async fn query_focused_monitor() -> Result<String> {
    let output = run_hyprctl_output(&["-j", "monitors"]).await?;
    decode_focused_monitor(&output)
}

fn decode_focused_monitor(payload: &[u8]) -> Result<String> {
    let monitors: Vec<Monitor> =
        serde_json::from_slice(payload).context("decode hyprctl monitors json")?;
    if let Some(focused) = monitors.iter().find(|m| m.focused) {
        return Ok(focused.name.trim().to_string());
    }
    match monitors.first() {
        Some(first) => Ok(first.name.trim().to_string()),
        None => bail!("hyprctl monitors returned no outputs"),
    }
}

/// Sends a literal hyprctl sendshortcut payload.
pub async fn send_shortcut(shortcut: &str) -> Result<()> {
    let shortcut = shortcut.trim();
    if shortcut.is_empty() {
        bail!("sendshortcut requires a non-empty payload");
    }
    run_hyprctl(&["--quiet", "dispatch", "sendshortcut", shortcut]).await
}

/// Sends a Hyprland notification payload.
pub async fn notify(icon: i32, timeout_ms: i32, color: &str, text: &str) -> Result<()> {
    let color = if color.trim().is_empty() {
        "rgb(89b4fa)"
    } else {
        color
    };
    run_hyprctl(&[
        "--quiet",
        "dispatch",
        "notify",
        &icon.to_string(),
        &timeout_ms.to_string(),
        color,
        text,
    ])
    .await
}

/// Dismisses active Hyprland notifications.
pub async fn dismiss_notify() -> Result<()> {
    run_hyprctl(&["--quiet", "dispatch", "dismissnotify"]).await
}

/// Sets an explicit Hyprland submap name.
pub async fn set_submap(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("submap name must not be empty");
    }
    run_hyprctl(&["dispatch", "submap", name]).await
}

/// Resets back to the default Hyprland submap.
pub async fn reset_submap() -> Result<()> {
    set_submap("reset").await
}

async fn run_hyprctl(args: &[&str]) -> Result<()> {
    run_hyprctl_output(args).await.map(|_| ())
}

/// Executes hyprctl and returns stdout; stderr is folded into errors.
async fn run_hyprctl_output(args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("hyprctl")
        .args(args)
        .output()
        .await
        .with_context(|| format!("hyprctl {args:?} failed to spawn"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        if detail.is_empty() {
            bail!("hyprctl {args:?} failed: {}", output.status);
        }
        bail!("hyprctl {args:?} failed: {} ({detail})", output.status);
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_window_decodes_and_trims() {
        let payload = br#"{"address": " 0x55d2b9a0 ", "class": "kitty", "initialClass": "kitty"}"#;
        let window = decode_active_window(payload).unwrap();
        assert_eq!(window.address, "0x55d2b9a0");
        assert_eq!(window.class, "kitty");
    }

    #[test]
    fn active_window_without_address_is_rejected() {
        let err = decode_active_window(br#"{"class": "kitty"}"#).unwrap_err();
        assert!(err.to_string().contains("empty address"));
    }

    #[test]
    fn active_window_bad_json_is_rejected() {
        assert!(decode_active_window(b"Invalid command").is_err());
    }

    #[test]
    fn focused_monitor_prefers_the_focused_entry() {
        let payload = br#"[
            {"name": "HDMI-A-1", "focused": false},
            {"name": "DP-1", "focused": true}
        ]"#;
        assert_eq!(decode_focused_monitor(payload).unwrap(), "DP-1");
    }

    #[test]
    fn focused_monitor_falls_back_to_first() {
        let payload = br#"[{"name": "HDMI-A-1", "focused": false}]"#;
        assert_eq!(decode_focused_monitor(payload).unwrap(), "HDMI-A-1");
    }

    #[test]
    fn no_monitors_is_an_error() {
        assert!(decode_focused_monitor(b"[]").is_err());
    }
}
