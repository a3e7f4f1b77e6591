//! Fixed-size PCM chunking over a capture backend.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::backend::{AudioBackend, CaptureStream, PcmSink};
use super::Device;

/// 20 ms of 16 kHz mono s16 audio.
pub const CHUNK_SIZE_BYTES: usize = 640;

const CHUNK_QUEUE_DEPTH: usize = 128;

#[derive(Default)]
struct PcmState {
    pending: Vec<u8>,
    raw_pcm: Vec<u8>,
}

struct CaptureShared {
    stopped: AtomicBool,
    bytes: AtomicU64,
    state: Mutex<PcmState>,
    chunk_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

impl CaptureShared {
    /// Receives one raw backend buffer and emits full chunks in order.
    fn on_pcm(&self, buffer: &[u8]) {
        if buffer.is_empty() || self.stopped.load(Ordering::Acquire) {
            return;
        }

        let chunks = {
            let mut state = self.state.lock().expect("capture state lock");
            state.raw_pcm.extend_from_slice(buffer);
            state.pending.extend_from_slice(buffer);
            drain_full_chunks(&mut state.pending)
        };
        self.bytes.fetch_add(buffer.len() as u64, Ordering::Relaxed);

        let tx = {
            let guard = self.chunk_tx.lock().expect("capture channel lock");
            match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => return,
            }
        };

        for chunk in chunks {
            let mut chunk = chunk;
            loop {
                if self.stopped.load(Ordering::Acquire) {
                    return;
                }
                match tx.try_send(chunk) {
                    Ok(()) => break,
                    Err(mpsc::error::TrySendError::Full(returned)) => {
                        chunk = returned;
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
        }
    }
}

/// Streams fixed-size PCM chunks from one selected input source.
pub struct Capture {
    device: Device,
    shared: Arc<CaptureShared>,
    chunks_rx: Option<mpsc::Receiver<Vec<u8>>>,
    stream: Option<Box<dyn CaptureStream>>,
}

impl Capture {
    /// Opens a 16 kHz mono s16le stream on `device` and starts chunking.
    pub async fn start(backend: &dyn AudioBackend, device: Device) -> Result<Capture> {
        let (chunk_tx, chunks_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let shared = Arc::new(CaptureShared {
            stopped: AtomicBool::new(false),
            bytes: AtomicU64::new(0),
            state: Mutex::new(PcmState::default()),
            chunk_tx: Mutex::new(Some(chunk_tx)),
        });

        let sink: PcmSink = {
            let shared = Arc::clone(&shared);
            Arc::new(move |buffer: &[u8]| shared.on_pcm(buffer))
        };
        let stream = backend.open_capture(&device, sink).await?;

        Ok(Capture {
            device,
            shared,
            chunks_rx: Some(chunks_rx),
            stream: Some(stream),
        })
    }

    /// Capture metadata for logging and diagnostics.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The PCM chunk sequence. Yields until `stop` closes it; may be taken
    /// once.
    pub fn take_chunks(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.chunks_rx.take()
    }

    /// Total bytes accepted from the backend.
    pub fn bytes_captured(&self) -> u64 {
        self.shared.bytes.load(Ordering::Relaxed)
    }

    /// Snapshot of all captured raw PCM bytes.
    pub fn raw_pcm(&self) -> Vec<u8> {
        self.shared
            .state
            .lock()
            .expect("capture state lock")
            .raw_pcm
            .clone()
    }

    /// Halts the stream, flushes residual PCM, and closes the chunk sequence
    /// exactly once. Safe to call more than once.
    pub async fn stop(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(stream) = self.stream.take() {
            // Joins the backend's delivery thread; no sink callback can run
            // after this returns.
            let _ = tokio::task::spawn_blocking(move || stream.stop()).await;
        }

        let residual = {
            let mut state = self.shared.state.lock().expect("capture state lock");
            std::mem::take(&mut state.pending)
        };

        let mut guard = self.shared.chunk_tx.lock().expect("capture channel lock");
        if let Some(tx) = guard.as_ref() {
            if !residual.is_empty() {
                let _ = tx.try_send(residual);
            }
        }
        *guard = None;
    }
}

/// Splits `pending` into in-order chunks of exactly [`CHUNK_SIZE_BYTES`],
/// leaving any shorter tail in place.
fn drain_full_chunks(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let full = pending.len() / CHUNK_SIZE_BYTES;
    let mut chunks = Vec::with_capacity(full);
    for _ in 0..full {
        let rest = pending.split_off(CHUNK_SIZE_BYTES);
        chunks.push(std::mem::replace(pending, rest));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_nothing_below_chunk_size() {
        let mut pending = vec![1u8; CHUNK_SIZE_BYTES - 1];
        assert!(drain_full_chunks(&mut pending).is_empty());
        assert_eq!(pending.len(), CHUNK_SIZE_BYTES - 1);
    }

    #[test]
    fn drains_exact_multiples() {
        let mut pending: Vec<u8> = (0..(CHUNK_SIZE_BYTES * 2) as u32)
            .map(|i| (i % 251) as u8)
            .collect();
        let original = pending.clone();
        let chunks = drain_full_chunks(&mut pending);
        assert_eq!(chunks.len(), 2);
        assert!(pending.is_empty());
        assert!(chunks.iter().all(|c| c.len() == CHUNK_SIZE_BYTES));
        let rejoined: Vec<u8> = chunks.concat();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn keeps_the_short_tail_pending() {
        let mut pending = vec![7u8; CHUNK_SIZE_BYTES + 100];
        let chunks = drain_full_chunks(&mut pending);
        assert_eq!(chunks.len(), 1);
        assert_eq!(pending.len(), 100);
    }
}
