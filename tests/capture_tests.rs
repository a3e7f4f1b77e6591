// Integration tests for audio capture chunking over a fake backend: chunk
// sizing, ordering, residual flush, and stop semantics.

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use sotto::audio::{
    AudioBackend, Capture, CaptureStream, Device, PcmSink, CHUNK_SIZE_BYTES,
};

fn test_device() -> Device {
    Device {
        id: "fake-mic".to_string(),
        description: "Fake Microphone".to_string(),
        state: "running".to_string(),
        available: true,
        muted: false,
        default: true,
    }
}

/// Delivers scripted PCM buffers on a background thread, then idles until
/// stopped.
struct FakeBackend {
    buffers: Vec<Vec<u8>>,
}

struct FakeStream {
    stop_tx: std_mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl CaptureStream for FakeStream {
    fn stop(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(vec![test_device()])
    }

    async fn open_capture(&self, _device: &Device, sink: PcmSink) -> Result<Box<dyn CaptureStream>> {
        let buffers = self.buffers.clone();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let join = thread::spawn(move || {
            for buffer in buffers {
                sink(&buffer);
            }
            let _ = stop_rx.recv();
        });
        Ok(Box::new(FakeStream {
            stop_tx,
            join: Some(join),
        }))
    }
}

fn pcm_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

async fn drain_chunks(capture: &mut Capture) -> Vec<Vec<u8>> {
    let mut rx = capture.take_chunks().expect("chunk sequence");
    capture.stop().await;

    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }
    chunks
}

#[tokio::test]
async fn chunks_are_fixed_size_with_one_residual() {
    // 3 full chunks plus a 100-byte tail.
    let total = CHUNK_SIZE_BYTES * 3 + 100;
    let backend = FakeBackend {
        buffers: vec![pcm_bytes(total, 7)],
    };
    let mut capture = Capture::start(&backend, test_device()).await.unwrap();
    // Let the delivery thread finish before stopping.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let chunks = drain_chunks(&mut capture).await;
    assert_eq!(chunks.len(), 4);
    for chunk in &chunks[..3] {
        assert_eq!(chunk.len(), CHUNK_SIZE_BYTES);
    }
    assert_eq!(chunks[3].len(), 100);
}

#[tokio::test]
async fn chunk_stream_reassembles_the_captured_bytes() {
    // Odd-sized buffers exercise the pending-buffer carry.
    let buffers = vec![
        pcm_bytes(333, 1),
        pcm_bytes(1000, 2),
        pcm_bytes(7, 3),
        pcm_bytes(CHUNK_SIZE_BYTES, 4),
    ];
    let expected: Vec<u8> = buffers.iter().flatten().copied().collect();

    let backend = FakeBackend { buffers };
    let mut capture = Capture::start(&backend, test_device()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let raw_before_stop = capture.raw_pcm();
    let chunks = drain_chunks(&mut capture).await;

    let reassembled: Vec<u8> = chunks.concat();
    assert_eq!(reassembled, expected);
    assert_eq!(raw_before_stop, expected);
    assert_eq!(capture.raw_pcm(), expected);
    assert_eq!(capture.bytes_captured(), expected.len() as u64);
}

#[tokio::test]
async fn empty_buffers_are_ignored() {
    let backend = FakeBackend {
        buffers: vec![Vec::new(), pcm_bytes(CHUNK_SIZE_BYTES, 9), Vec::new()],
    };
    let mut capture = Capture::start(&backend, test_device()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let chunks = drain_chunks(&mut capture).await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(capture.bytes_captured(), CHUNK_SIZE_BYTES as u64);
}

#[tokio::test]
async fn stop_is_idempotent_and_closes_the_sequence_once() {
    let backend = FakeBackend {
        buffers: vec![pcm_bytes(100, 5)],
    };
    let mut capture = Capture::start(&backend, test_device()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut rx = capture.take_chunks().expect("chunk sequence");
    capture.stop().await;
    capture.stop().await;

    // Exactly one residual chunk, then the closed sequence.
    let first = rx.recv().await;
    assert_eq!(first.as_deref(), Some(&pcm_bytes(100, 5)[..]));
    assert!(rx.recv().await.is_none());

    capture.stop().await;
    assert_eq!(capture.bytes_captured(), 100);
}

#[tokio::test]
async fn stop_without_pending_bytes_emits_no_residual() {
    let backend = FakeBackend {
        buffers: vec![pcm_bytes(CHUNK_SIZE_BYTES * 2, 11)],
    };
    let mut capture = Capture::start(&backend, test_device()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let chunks = drain_chunks(&mut capture).await;
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.len() == CHUNK_SIZE_BYTES));
}
