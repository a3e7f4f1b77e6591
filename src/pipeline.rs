//! End-to-end capture → ASR → transcript pipeline for one session.

use std::fs;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::asr::{self, Stream, StreamConfig};
use crate::audio::{self, AudioBackend, Capture};
use crate::config::{self, Config};
use crate::logging;
use crate::session::{PipelineUnavailable, StopFailure, StopResult, Transcriber};
use crate::transcript;

const STREAM_CLOSE_TIMEOUT: Duration = Duration::from_secs(20);
const WAV_SAMPLE_RATE: u32 = 16_000;

#[derive(Default)]
struct Inner {
    started: bool,
    selection: Option<audio::Selection>,
    capture: Option<Capture>,
    stream: Option<Arc<Stream>>,
    send_outcome: Option<oneshot::Receiver<Option<anyhow::Error>>>,
}

/// Owns one capture → ASR → transcript pipeline instance.
pub struct PipelineTranscriber {
    cfg: Config,
    backend: Arc<dyn AudioBackend>,
    inner: Mutex<Inner>,
}

impl PipelineTranscriber {
    pub fn new(cfg: Config, backend: Arc<dyn AudioBackend>) -> Self {
        PipelineTranscriber {
            cfg,
            backend,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn transcript_options(&self) -> transcript::Options {
        transcript::Options {
            trailing_space: self.cfg.transcript.trailing_space,
            capitalize_sentences: self.cfg.transcript.capitalize_sentences,
        }
    }

    fn write_debug_audio(&self, raw_pcm: &[u8]) {
        if !self.cfg.debug.audio_dump || raw_pcm.is_empty() {
            return;
        }
        if let Err(err) = write_pcm16_wav_file(raw_pcm) {
            warn!(error = %err, "unable to write debug audio dump");
        }
    }
}

#[async_trait]
impl Transcriber for PipelineTranscriber {
    /// Resolves device selection, dials the ASR stream, and starts capture.
    async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.started {
            bail!("transcriber already started");
        }

        let selection = audio::select_device(
            self.backend.as_ref(),
            &self.cfg.audio.input,
            &self.cfg.audio.fallback,
        )
        .await?;
        if let Some(warning) = &selection.warning {
            warn!("{warning}");
        }

        let (speech_phrases, _) =
            config::build_speech_phrases(&self.cfg).context("build speech contexts")?;

        let debug_sink = if self.cfg.debug.grpc_dump {
            Some(create_debug_file("grpc", "json")?)
        } else {
            None
        };

        let dial = Stream::dial(StreamConfig {
            endpoint: self.cfg.riva_grpc.clone(),
            language_code: self.cfg.asr.language_code.clone(),
            model: self.cfg.asr.model.clone(),
            automatic_punctuation: self.cfg.asr.automatic_punctuation,
            speech_phrases,
            dial_timeout: Duration::from_secs(3),
            debug_response_sink: debug_sink.map(|file| Box::new(file) as asr::DebugResponseSink),
        });
        let stream = tokio::select! {
            _ = cancel.cancelled() => bail!("session cancelled while dialing recognizer"),
            dialed = dial => dialed?,
        };

        let mut capture =
            match Capture::start(self.backend.as_ref(), selection.device.clone()).await {
                Ok(capture) => capture,
                Err(err) => {
                    stream.cancel();
                    return Err(err);
                }
            };

        let chunks = match capture.take_chunks() {
            Some(chunks) => chunks,
            None => {
                stream.cancel();
                capture.stop().await;
                bail!("capture chunk sequence unavailable");
            }
        };

        let stream = Arc::new(stream);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        tokio::spawn(send_loop(chunks, Arc::clone(&stream), outcome_tx));

        debug!(device = %audio::describe_device(&selection.device), "pipeline started");
        inner.selection = Some(selection);
        inner.capture = Some(capture);
        inner.stream = Some(stream);
        inner.send_outcome = Some(outcome_rx);
        inner.started = true;
        Ok(())
    }

    /// Stops capture, drains the stream, and assembles the transcript.
    async fn stop_and_transcribe(&self) -> Result<StopResult, StopFailure> {
        let (selection, mut capture, stream, outcome_rx) = {
            let mut inner = self.inner.lock().await;
            match (
                inner.started,
                inner.selection.take(),
                inner.capture.take(),
                inner.stream.take(),
            ) {
                (true, Some(selection), Some(capture), Some(stream)) => {
                    (selection, capture, stream, inner.send_outcome.take())
                }
                _ => return Err(StopFailure::bare(PipelineUnavailable.into())),
            }
        };

        capture.stop().await;
        let audio_device = audio::describe_device(&selection.device);
        let bytes_captured = capture.bytes_captured();

        let send_err = match outcome_rx {
            Some(rx) => rx.await.unwrap_or(None),
            None => None,
        };
        if let Some(send_err) = send_err {
            stream.cancel();
            self.write_debug_audio(&capture.raw_pcm());
            return Err(StopFailure {
                audio_device,
                bytes_captured,
                grpc_latency: Duration::ZERO,
                source: send_err.context("send audio stream"),
            });
        }

        let close_token = CancellationToken::new();
        let deadline = {
            let token = close_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(STREAM_CLOSE_TIMEOUT).await;
                token.cancel();
            })
        };
        let collected = stream.close_and_collect(&close_token).await;
        deadline.abort();

        self.write_debug_audio(&capture.raw_pcm());

        let (segments, grpc_latency) = match collected {
            Ok(collected) => collected,
            Err(err) => {
                return Err(StopFailure {
                    audio_device,
                    bytes_captured,
                    grpc_latency: Duration::ZERO,
                    source: err.context("collect final transcript"),
                });
            }
        };

        let transcribed = transcript::assemble(&segments, self.transcript_options());
        Ok(StopResult {
            transcript: transcribed,
            audio_device,
            bytes_captured,
            grpc_latency,
        })
    }

    /// Stops capture and stream immediately without transcript commit.
    async fn cancel(&self) {
        let (capture, stream) = {
            let mut inner = self.inner.lock().await;
            inner.send_outcome = None;
            (inner.capture.take(), inner.stream.take())
        };

        if let Some(mut capture) = capture {
            capture.stop().await;
            self.write_debug_audio(&capture.raw_pcm());
        }
        if let Some(stream) = stream {
            stream.cancel();
        }
    }
}

/// Forwards capture chunks to the ASR stream and reports the first failure.
async fn send_loop(
    mut chunks: mpsc::Receiver<Vec<u8>>,
    stream: Arc<Stream>,
    outcome_tx: oneshot::Sender<Option<anyhow::Error>>,
) {
    let mut outcome = None;
    while let Some(chunk) = chunks.recv().await {
        if chunk.is_empty() {
            continue;
        }
        if let Err(err) = stream.send_audio(&chunk).await {
            outcome = Some(err);
            break;
        }
    }
    let _ = outcome_tx.send(outcome);
}

/// Writes the raw capture mirror as a 16 kHz mono s16 WAV debug artifact.
fn write_pcm16_wav_file(pcm: &[u8]) -> Result<()> {
    let file = create_debug_file("audio", "wav")?;
    write_pcm16_wav(file, pcm)
}

/// Streams raw little-endian PCM into `writer` with a standard WAV header.
pub fn write_pcm16_wav<W: std::io::Write + std::io::Seek>(writer: W, pcm: &[u8]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: WAV_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav = hound::WavWriter::new(writer, spec).context("create WAV writer")?;
    for sample in pcm.chunks_exact(2) {
        wav.write_sample(i16::from_le_bytes([sample[0], sample[1]]))
            .context("write WAV sample")?;
    }
    wav.finalize().context("finalize WAV file")?;
    Ok(())
}

/// Creates a timestamped debug artifact under `<state_dir>/sotto/debug`.
fn create_debug_file(prefix: &str, extension: &str) -> Result<fs::File> {
    let path = debug_file_path(prefix, extension)?;
    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(&path)
        .with_context(|| format!("open debug file {}", path.display()))
}

fn debug_file_path(prefix: &str, extension: &str) -> Result<PathBuf> {
    let debug_dir = logging::state_dir()?.join("sotto").join("debug");
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&debug_dir)
        .context("create debug dir")?;

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    Ok(debug_dir.join(format!("{prefix}-{timestamp}.{extension}")))
}
