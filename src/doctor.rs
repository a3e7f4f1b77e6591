//! Runtime readiness diagnostics for config, tools, audio, and the ASR
//! backend.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{self, AudioBackend};
use crate::config::{Config, Loaded};

const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One doctor assertion result.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub pass: bool,
    pub message: String,
}

/// The full doctor output contract.
#[derive(Debug, Clone)]
pub struct Report {
    pub checks: Vec<Check>,
}

impl Report {
    /// True when all checks pass.
    pub fn ok(&self) -> bool {
        self.checks.iter().all(|check| check.pass)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for check in &self.checks {
            if !first {
                writeln!(f)?;
            }
            first = false;
            let status = if check.pass { "OK" } else { "FAIL" };
            write!(f, "[{status}] {}: {}", check.name, check.message)?;
        }
        Ok(())
    }
}

/// Executes environment/config/runtime checks for a loaded config.
pub async fn run(loaded: &Loaded, backend: &dyn AudioBackend) -> Report {
    let mut checks = vec![Check {
        name: "config".to_string(),
        pass: true,
        message: format!("loaded {:?}", loaded.path.display().to_string()),
    }];

    checks.push(check_env(
        "XDG_SESSION_TYPE",
        |value| value.trim().eq_ignore_ascii_case("wayland"),
        "session type is wayland",
        "expected XDG_SESSION_TYPE=wayland",
    ));

    checks.push(check_env(
        "HYPRLAND_INSTANCE_SIGNATURE",
        |value| !value.trim().is_empty(),
        "Hyprland session detected",
        "HYPRLAND_INSTANCE_SIGNATURE is empty",
    ));

    checks.push(check_command(&loaded.config.clipboard.argv, "clipboard_cmd"));

    if loaded.config.paste.enable {
        if !loaded.config.paste_cmd.argv.is_empty() {
            checks.push(check_command(&loaded.config.paste_cmd.argv, "paste_cmd"));
        } else {
            checks.push(check_binary("hyprctl", "default paste path requires hyprctl"));
        }
    }

    checks.push(check_audio_selection(&loaded.config, backend).await);
    checks.push(check_asr_ready(&loaded.config).await);

    Report { checks }
}

/// Validates an environment variable through a caller-supplied predicate.
fn check_env(
    name: &str,
    predicate: impl Fn(&str) -> bool,
    ok_message: &str,
    fail_message: &str,
) -> Check {
    let value = std::env::var(name).unwrap_or_default();
    Check {
        name: name.to_string(),
        pass: predicate(&value),
        message: if predicate(&value) {
            ok_message.to_string()
        } else {
            fail_message.to_string()
        },
    }
}

/// Validates that argv contains a runnable command.
fn check_command(argv: &[String], name: &str) -> Check {
    match argv.first() {
        Some(program) => check_binary(program, &format!("{name} command is available")),
        None => Check {
            name: name.to_string(),
            pass: false,
            message: "command is empty".to_string(),
        },
    }
}

/// Validates that a binary exists in PATH.
fn check_binary(bin: &str, ok_message: &str) -> Check {
    match find_in_path(bin) {
        Some(path) => Check {
            name: bin.to_string(),
            pass: true,
            message: format!("found at {} ({ok_message})", path.display()),
        },
        None => Check {
            name: bin.to_string(),
            pass: false,
            message: format!("binary not found in PATH: {bin}"),
        },
    }
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Runs live device selection to surface selection/fallback issues.
async fn check_audio_selection(cfg: &Config, backend: &dyn AudioBackend) -> Check {
    match audio::select_device(backend, &cfg.audio.input, &cfg.audio.fallback).await {
        Ok(selection) => {
            let mut message = format!("selected {:?}", selection.device.id);
            if let Some(warning) = selection.warning {
                message = format!("{message} ({warning})");
            }
            Check {
                name: "audio.device".to_string(),
                pass: true,
                message,
            }
        }
        Err(err) => Check {
            name: "audio.device".to_string(),
            pass: false,
            message: format!("{err:#}"),
        },
    }
}

/// Probes the configured ASR HTTP readiness endpoint.
async fn check_asr_ready(cfg: &Config) -> Check {
    let name = "riva.ready".to_string();
    let base = cfg.riva_http.trim();
    if base.is_empty() {
        return Check {
            name,
            pass: false,
            message: "riva.http is empty".to_string(),
        };
    }

    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    let url = format!(
        "{}{}",
        base.trim_end_matches('/'),
        cfg.riva_health_path
    );

    let client = match reqwest::Client::builder().timeout(HTTP_PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            return Check {
                name,
                pass: false,
                message: format!("build HTTP client: {err}"),
            };
        }
    };

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            return Check {
                name,
                pass: false,
                message: format!("request failed: {err}"),
            };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Check {
            name,
            pass: false,
            message: format!("HTTP {} from {url}", status.as_u16()),
        };
    }

    let body = response.text().await.unwrap_or_default();
    let body = body.trim().to_lowercase();
    if !body.is_empty() && !body.contains("ready") {
        return Check {
            name,
            pass: true,
            message: format!("HTTP {} from {url}", status.as_u16()),
        };
    }

    Check {
        name,
        pass: true,
        message: format!("ready at {url}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_renders_ok_and_fail_lines() {
        let report = Report {
            checks: vec![
                Check {
                    name: "config".to_string(),
                    pass: true,
                    message: "loaded".to_string(),
                },
                Check {
                    name: "audio.device".to_string(),
                    pass: false,
                    message: "no devices".to_string(),
                },
            ],
        };
        let rendered = report.to_string();
        assert!(rendered.contains("[OK] config: loaded"));
        assert!(rendered.contains("[FAIL] audio.device: no devices"));
        assert!(!report.ok());
    }

    #[test]
    fn empty_report_is_ok() {
        assert!(Report { checks: Vec::new() }.ok());
    }
}
