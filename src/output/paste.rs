//! Default paste path: hyprctl sendshortcut targeted at the active window.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::hypr;

const WINDOW_QUERY_ATTEMPTS: usize = 5;
const WINDOW_QUERY_DELAY: Duration = Duration::from_millis(10);

pub(super) async fn default_paste(shortcut: &str) -> Result<()> {
    let window = active_window_with_retry(WINDOW_QUERY_ATTEMPTS, WINDOW_QUERY_DELAY).await?;
    let payload = build_paste_shortcut(shortcut, window.address.trim())?;
    hypr::send_shortcut(&payload).await
}

/// Formats the `MOD,KEY,address:0x…` payload hyprctl expects.
fn build_paste_shortcut(shortcut: &str, window_address: &str) -> Result<String> {
    let shortcut = shortcut.trim();
    if shortcut.is_empty() {
        bail!("paste shortcut cannot be empty");
    }

    let address = window_address.trim();
    if address.is_empty() {
        bail!("active window address is required");
    }

    Ok(format!("{shortcut},address:{address}"))
}

/// Focus can lag right after the indicator hides; retry briefly.
async fn active_window_with_retry(
    attempts: usize,
    delay: Duration,
) -> Result<hypr::ActiveWindow> {
    let attempts = attempts.max(1);

    let mut last_err = None;
    for attempt in 0..attempts {
        match hypr::query_active_window().await {
            Ok(window) => return Ok(window),
            Err(err) => last_err = Some(err),
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("active window unavailable")))
        .context("resolve active window")
}
