//! Audio capture backend trait and the cpal implementation.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::warn;

use super::Device;

/// Receives raw little-endian s16 PCM buffers from the capture callback.
pub type PcmSink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// One running capture stream.
pub trait CaptureStream: Send {
    /// Stops delivery and blocks until no further sink callbacks can run.
    fn stop(self: Box<Self>);
}

/// Capture backend seam: the pipeline depends on this, tests fake it.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Opens a 16 kHz mono s16le stream on `device`, delivering byte buffers
    /// to `sink` until the returned stream is stopped.
    async fn open_capture(&self, device: &Device, sink: PcmSink) -> Result<Box<dyn CaptureStream>>;
}

/// cpal-based input backend used by the runtime binary.
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        CpalBackend
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioBackend for CpalBackend {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        tokio::task::spawn_blocking(enumerate_input_devices)
            .await
            .context("device enumeration task")?
    }

    async fn open_capture(&self, device: &Device, sink: PcmSink) -> Result<Box<dyn CaptureStream>> {
        let device_id = device.id.clone();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        // cpal streams are !Send; a dedicated thread owns the stream for its
        // whole lifetime and drops it on the stop signal.
        let join = thread::Builder::new()
            .name("sotto-capture".to_string())
            .spawn(move || match build_input_stream(&device_id, sink) {
                Ok(stream) => {
                    if let Err(err) = stream.play() {
                        let _ = ready_tx.send(Err(anyhow!(err).context("start capture stream")));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("spawn capture thread")?;

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .context("capture readiness task")?;
        match ready {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureStream {
                stop_tx,
                join: Some(join),
            })),
            Ok(Err(err)) => {
                let _ = join.join();
                Err(err)
            }
            Err(_) => {
                let _ = join.join();
                Err(anyhow!("capture thread exited before readiness"))
            }
        }
    }
}

struct CpalCaptureStream {
    stop_tx: std_mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {
    fn stop(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn enumerate_input_devices() -> Result<Vec<Device>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|device| device.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices().context("list input devices")? {
        let name = match device.name() {
            Ok(name) => name,
            Err(err) => {
                warn!(error = %err, "skipping unnameable input device");
                continue;
            }
        };
        let available = device.default_input_config().is_ok();
        let state = if available { "running" } else { "unavailable" };
        devices.push(Device {
            id: name.clone(),
            description: name.clone(),
            state: state.to_string(),
            available,
            // cpal does not surface mute state; the selection policy still
            // honors the field for backends that do.
            muted: false,
            default: default_name.as_deref() == Some(name.as_str()),
        });
    }
    Ok(devices)
}

fn build_input_stream(device_id: &str, sink: PcmSink) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .input_devices()
        .context("list input devices")?
        .find(|device| {
            device
                .name()
                .map(|name| name == device_id)
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("resolve source {device_id:?}"))?;

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(16_000),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                sink(&bytes);
            },
            |err| warn!(error = %err, "capture stream error"),
            None,
        )
        .with_context(|| format!("open capture stream on {device_id:?}"))?;

    Ok(stream)
}
