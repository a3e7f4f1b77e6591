//! Input-device discovery, selection policy, and PCM capture.

pub mod backend;
pub mod capture;

pub use backend::{AudioBackend, CaptureStream, CpalBackend, PcmSink};
pub use capture::{Capture, CHUNK_SIZE_BYTES};

use anyhow::{bail, Result};

/// One input source surfaced to sotto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub description: String,
    pub state: String,
    pub available: bool,
    pub muted: bool,
    pub default: bool,
}

/// The resolved capture source plus optional fallback warning context.
#[derive(Debug, Clone)]
pub struct Selection {
    pub device: Device,
    pub warning: Option<String>,
    pub fallback: bool,
}

/// Resolves `audio.input`/`audio.fallback` preferences against live devices.
pub async fn select_device(
    backend: &dyn AudioBackend,
    input: &str,
    fallback: &str,
) -> Result<Selection> {
    let devices = backend.list_devices().await?;
    select_from_list(&devices, input, fallback)
}

/// Applies selection policy to a pre-fetched device list.
pub fn select_from_list(devices: &[Device], input: &str, fallback: &str) -> Result<Selection> {
    if devices.is_empty() {
        bail!("no audio input devices found");
    }

    let input = input.trim().to_lowercase();
    let fallback = fallback.trim().to_lowercase();

    let default_device = devices.iter().find(|d| d.default);
    let by_input = if input.is_empty() || input == "default" {
        None
    } else {
        devices.iter().find(|d| device_matches(d, &input))
    };
    let by_fallback = if fallback.is_empty() || fallback == "default" {
        None
    } else {
        devices.iter().find(|d| device_matches(d, &fallback))
    };

    let choose_default = || -> Result<&Device> {
        match default_device {
            Some(device) => Ok(device),
            None => bail!("default audio source is unavailable"),
        }
    };

    let primary = if input.is_empty() || input == "default" {
        choose_default()?
    } else {
        match by_input {
            Some(device) => device,
            None => bail!("audio.input {input:?} did not match any device"),
        }
    };

    if primary.available && !primary.muted {
        return Ok(Selection {
            device: primary.clone(),
            warning: None,
            fallback: false,
        });
    }

    let primary_reason = if primary.muted { "muted" } else { "unavailable" };

    let fallback_device = if !fallback.is_empty() && fallback != "default" {
        match by_fallback {
            Some(device) => device,
            None => bail!(
                "primary input {:?} is {primary_reason} and fallback {fallback:?} not found",
                primary.id
            ),
        }
    } else {
        match choose_default() {
            Ok(device) => device,
            Err(err) => bail!(
                "primary input {:?} is {primary_reason} and no usable fallback: {err}",
                primary.id
            ),
        }
    };

    if !fallback_device.available {
        bail!(
            "audio fallback device {:?} is not available",
            fallback_device.id
        );
    }
    if fallback_device.muted {
        bail!("audio fallback device {:?} is muted", fallback_device.id);
    }

    Ok(Selection {
        device: fallback_device.clone(),
        warning: Some(format!(
            "audio.input {:?} is {primary_reason}; falling back to {:?}",
            primary.id, fallback_device.id
        )),
        fallback: primary.id != fallback_device.id,
    })
}

/// Reports whether a search term matches a device id or description.
fn device_matches(device: &Device, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    device.id.to_lowercase().contains(term) || device.description.to_lowercase().contains(term)
}

/// Formats device metadata for logs and session results.
pub fn describe_device(device: &Device) -> String {
    let description = device.description.trim();
    let id = device.id.trim();
    if description.is_empty() {
        return id.to_string();
    }
    if id.is_empty() {
        return description.to_string();
    }
    format!("{description} ({id})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, available: bool, muted: bool, default: bool) -> Device {
        Device {
            id: id.to_string(),
            description: format!("{id} description"),
            state: "running".to_string(),
            available,
            muted,
            default,
        }
    }

    #[test]
    fn empty_input_uses_default_device() {
        let devices = vec![
            device("usb-mic", true, false, false),
            device("internal", true, false, true),
        ];
        let selection = select_from_list(&devices, "", "").unwrap();
        assert_eq!(selection.device.id, "internal");
        assert!(selection.warning.is_none());
        assert!(!selection.fallback);
    }

    #[test]
    fn input_matches_by_substring_case_insensitive() {
        let devices = vec![
            device("USB-Microphone", true, false, false),
            device("internal", true, false, true),
        ];
        let selection = select_from_list(&devices, "usb", "").unwrap();
        assert_eq!(selection.device.id, "USB-Microphone");
    }

    #[test]
    fn input_matches_description_too() {
        let devices = vec![
            Device {
                id: "alsa_input.pci-0000".to_string(),
                description: "Blue Yeti".to_string(),
                state: "running".to_string(),
                available: true,
                muted: false,
                default: false,
            },
            device("internal", true, false, true),
        ];
        let selection = select_from_list(&devices, "yeti", "").unwrap();
        assert_eq!(selection.device.id, "alsa_input.pci-0000");
    }

    #[test]
    fn unmatched_input_is_an_error() {
        let devices = vec![device("internal", true, false, true)];
        let err = select_from_list(&devices, "usb", "").unwrap_err();
        assert!(err.to_string().contains("did not match"));
    }

    #[test]
    fn muted_primary_falls_back_to_default_with_warning() {
        let devices = vec![
            device("usb-mic", true, true, false),
            device("internal", true, false, true),
        ];
        let selection = select_from_list(&devices, "usb", "").unwrap();
        assert_eq!(selection.device.id, "internal");
        assert!(selection.fallback);
        let warning = selection.warning.unwrap();
        assert!(warning.contains("muted"), "warning was {warning:?}");
    }

    #[test]
    fn unavailable_primary_uses_named_fallback() {
        let devices = vec![
            device("usb-mic", false, false, false),
            device("headset", true, false, false),
            device("internal", true, false, true),
        ];
        let selection = select_from_list(&devices, "usb", "headset").unwrap();
        assert_eq!(selection.device.id, "headset");
        assert!(selection.fallback);
    }

    #[test]
    fn muted_fallback_is_an_error() {
        let devices = vec![
            device("usb-mic", false, false, false),
            device("headset", true, true, false),
        ];
        let err = select_from_list(&devices, "usb", "headset").unwrap_err();
        assert!(err.to_string().contains("muted"));
    }

    #[test]
    fn no_devices_is_an_error() {
        assert!(select_from_list(&[], "", "").is_err());
    }

    #[test]
    fn describe_device_joins_description_and_id() {
        let d = device("mic0", true, false, false);
        assert_eq!(describe_device(&d), "mic0 description (mic0)");
    }
}
