//! One active StreamingRecognize RPC lifecycle: dial, send audio, collect.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tracing::debug;

use super::merge::{append_segment, clean_segment, collect_segments};
use super::proto::riva_speech_recognition_client::RivaSpeechRecognitionClient;
use super::proto::streaming_recognize_request::StreamingRequest;
use super::proto::{
    AudioEncoding, RecognitionConfig, SpeechContext, StreamingRecognitionConfig,
    StreamingRecognizeRequest, StreamingRecognizeResponse,
};
use super::SpeechPhrase;

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);
const AUDIO_QUEUE_DEPTH: usize = 128;

/// Optional sink receiving one JSON line per recognition response.
pub type DebugResponseSink = Box<dyn Write + Send>;

/// Controls stream initialization and recognition behavior.
pub struct StreamConfig {
    pub endpoint: String,
    pub language_code: String,
    pub model: String,
    pub automatic_punctuation: bool,
    pub speech_phrases: Vec<SpeechPhrase>,
    pub dial_timeout: Duration,
    pub debug_response_sink: Option<DebugResponseSink>,
}

/// Transcript state mutated only by the receive task and read once at close.
#[derive(Default)]
struct Merged {
    segments: Vec<String>,
    last_interim: String,
    recv_err: Option<tonic::Status>,
}

struct Shared {
    audio_tx: Option<mpsc::Sender<StreamingRecognizeRequest>>,
    recv_task: Option<JoinHandle<()>>,
}

/// Wraps one active streaming-recognize RPC.
pub struct Stream {
    shared: Mutex<Shared>,
    merged: Arc<Mutex<Merged>>,
}

impl Stream {
    /// Establishes the connection, sends the config frame, and starts the
    /// receive task.
    pub async fn dial(mut cfg: StreamConfig) -> Result<Stream> {
        let endpoint = cfg.endpoint.trim().to_string();
        if endpoint.is_empty() {
            bail!("asr endpoint is empty");
        }
        let dial_timeout = if cfg.dial_timeout.is_zero() {
            DEFAULT_DIAL_TIMEOUT
        } else {
            cfg.dial_timeout
        };
        if cfg.language_code.trim().is_empty() {
            cfg.language_code = "en-US".to_string();
        }

        let uri = if endpoint.contains("://") {
            endpoint.clone()
        } else {
            format!("http://{endpoint}")
        };
        let channel = tokio::time::timeout(
            dial_timeout,
            Endpoint::from_shared(uri)
                .with_context(|| format!("invalid asr endpoint {endpoint:?}"))?
                .connect(),
        )
        .await
        .map_err(|_| anyhow!("asr grpc readiness timed out after {dial_timeout:?}"))?
        .with_context(|| format!("dial asr grpc {endpoint:?}"))?;

        let mut client = RivaSpeechRecognitionClient::new(channel);

        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_QUEUE_DEPTH);
        // Queue the config frame now so it is the first message on the wire.
        audio_tx
            .send(initial_config_request(&cfg))
            .await
            .map_err(|_| anyhow!("queue initial streaming config"))?;

        let response = tokio::time::timeout(
            dial_timeout,
            client.streaming_recognize(ReceiverStream::new(audio_rx)),
        )
        .await
        .map_err(|_| anyhow!("open streaming recognizer timed out after {dial_timeout:?}"))?
        .context("open streaming recognizer")?;

        let inbound = response.into_inner();
        let merged = Arc::new(Mutex::new(Merged::default()));
        let recv_task = tokio::spawn(recv_loop(
            inbound,
            Arc::clone(&merged),
            cfg.debug_response_sink.take(),
        ));

        Ok(Stream {
            shared: Mutex::new(Shared {
                audio_tx: Some(audio_tx),
                recv_task: Some(recv_task),
            }),
            merged,
        })
    }

    /// Sends one chunk of PCM audio over the active stream.
    pub async fn send_audio(&self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        if let Some(status) = self.recv_err() {
            return Err(anyhow!(status).context("stream receive task failed"));
        }

        let tx = {
            let shared = self.shared.lock().expect("stream state lock");
            match &shared.audio_tx {
                Some(tx) => tx.clone(),
                None => bail!("stream already closed for sending"),
            }
        };

        let request = StreamingRecognizeRequest {
            streaming_request: Some(StreamingRequest::AudioContent(chunk.to_vec())),
        };
        if tx.send(request).await.is_err() {
            if let Some(status) = self.recv_err() {
                return Err(anyhow!(status).context("stream receive task failed"));
            }
            bail!("send audio frame: stream closed by backend");
        }
        Ok(())
    }

    /// Closes send-side audio, waits for the receiver to drain, and returns
    /// merged transcript segments plus the close-to-drain latency.
    pub async fn close_and_collect(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, Duration)> {
        let closed_at = Instant::now();

        let recv_task = {
            let mut shared = self.shared.lock().expect("stream state lock");
            shared.audio_tx = None;
            shared.recv_task.take()
        };

        if let Some(mut task) = recv_task {
            tokio::select! {
                _ = cancel.cancelled() => {
                    task.abort();
                    return Err(anyhow!("transcript collection cancelled"));
                }
                joined = &mut task => {
                    if let Err(err) = joined {
                        if !err.is_cancelled() {
                            return Err(anyhow!(err).context("stream receive task panicked"));
                        }
                    }
                }
            }
        }

        let latency = closed_at.elapsed();

        let merged = self.merged.lock().expect("merged state lock");
        if let Some(status) = &merged.recv_err {
            return Err(anyhow!(status.clone()).context("receive recognition responses"));
        }
        Ok((
            collect_segments(&merged.segments, &merged.last_interim),
            latency,
        ))
    }

    /// Aborts stream processing and releases the connection. Idempotent.
    pub fn cancel(&self) {
        let recv_task = {
            let mut shared = self.shared.lock().expect("stream state lock");
            shared.audio_tx = None;
            shared.recv_task.take()
        };
        if let Some(task) = recv_task {
            task.abort();
        }
    }

    fn recv_err(&self) -> Option<tonic::Status> {
        self.merged
            .lock()
            .expect("merged state lock")
            .recv_err
            .clone()
    }
}

/// Builds the config frame sent before any audio bytes.
fn initial_config_request(cfg: &StreamConfig) -> StreamingRecognizeRequest {
    let speech_contexts = cfg
        .speech_phrases
        .iter()
        .filter(|p| !p.phrase.trim().is_empty())
        .map(|p| SpeechContext {
            phrases: vec![p.phrase.trim().to_string()],
            boost: p.boost,
        })
        .collect();

    StreamingRecognizeRequest {
        streaming_request: Some(StreamingRequest::StreamingConfig(
            StreamingRecognitionConfig {
                config: Some(RecognitionConfig {
                    encoding: AudioEncoding::LinearPcm as i32,
                    sample_rate_hertz: 16_000,
                    language_code: cfg.language_code.clone(),
                    max_alternatives: 0,
                    speech_contexts,
                    audio_channel_count: 1,
                    enable_automatic_punctuation: cfg.automatic_punctuation,
                    model: cfg.model.trim().to_string(),
                }),
                interim_results: true,
            },
        )),
    }
}

/// Receives recognition responses until stream close or error.
async fn recv_loop(
    mut inbound: tonic::Streaming<StreamingRecognizeResponse>,
    merged: Arc<Mutex<Merged>>,
    mut debug_sink: Option<DebugResponseSink>,
) {
    loop {
        match inbound.message().await {
            Ok(Some(response)) => record_response(&merged, &response, debug_sink.as_mut()),
            Ok(None) => return,
            Err(status) => {
                debug!(error = %status, "asr receive stream ended with error");
                merged.lock().expect("merged state lock").recv_err = Some(status);
                return;
            }
        }
    }
}

/// Merges final/interim results into stream state.
fn record_response(
    merged: &Mutex<Merged>,
    response: &StreamingRecognizeResponse,
    debug_sink: Option<&mut DebugResponseSink>,
) {
    if let Some(sink) = debug_sink {
        if let Ok(line) = serde_json::to_vec(&response_debug_json(response)) {
            let _ = sink.write_all(&line);
            let _ = sink.write_all(b"\n");
        }
    }

    let mut merged = merged.lock().expect("merged state lock");
    for result in &response.results {
        let transcript = match result.alternatives.first() {
            Some(alternative) => clean_segment(&alternative.transcript),
            None => continue,
        };
        if transcript.is_empty() {
            continue;
        }
        if result.is_final {
            append_segment(&mut merged.segments, &transcript);
            merged.last_interim.clear();
            continue;
        }

        // Keep only the latest interim hypothesis. The recognizer can reset
        // interim text boundaries between updates; pre-committing the prior
        // interim here can introduce duplicated or stale leading segments in
        // the final transcript.
        merged.last_interim = transcript;
    }
}

fn response_debug_json(response: &StreamingRecognizeResponse) -> serde_json::Value {
    serde_json::json!({
        "results": response
            .results
            .iter()
            .map(|result| {
                serde_json::json!({
                    "is_final": result.is_final,
                    "stability": result.stability,
                    "audio_processed": result.audio_processed,
                    "alternatives": result
                        .alternatives
                        .iter()
                        .map(|alt| {
                            serde_json::json!({
                                "transcript": alt.transcript,
                                "confidence": alt.confidence,
                            })
                        })
                        .collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> StreamConfig {
        StreamConfig {
            endpoint: "127.0.0.1:50051".to_string(),
            language_code: "en-US".to_string(),
            model: String::new(),
            automatic_punctuation: true,
            speech_phrases: Vec::new(),
            dial_timeout: Duration::from_secs(3),
            debug_response_sink: None,
        }
    }

    fn config_of(request: &StreamingRecognizeRequest) -> &RecognitionConfig {
        match request.streaming_request.as_ref() {
            Some(StreamingRequest::StreamingConfig(streaming)) => {
                streaming.config.as_ref().expect("recognition config")
            }
            other => panic!("expected streaming config frame, got {other:?}"),
        }
    }

    #[test]
    fn config_frame_pins_capture_format() {
        let request = initial_config_request(&base_config());
        let config = config_of(&request);
        assert_eq!(config.encoding, AudioEncoding::LinearPcm as i32);
        assert_eq!(config.sample_rate_hertz, 16_000);
        assert_eq!(config.audio_channel_count, 1);
        assert!(config.enable_automatic_punctuation);
        assert_eq!(config.language_code, "en-US");
    }

    #[test]
    fn config_frame_requests_interim_results() {
        let request = initial_config_request(&base_config());
        match request.streaming_request {
            Some(StreamingRequest::StreamingConfig(streaming)) => {
                assert!(streaming.interim_results)
            }
            other => panic!("expected streaming config frame, got {other:?}"),
        }
    }

    #[test]
    fn config_frame_skips_blank_speech_phrases() {
        let mut cfg = base_config();
        cfg.speech_phrases = vec![
            SpeechPhrase {
                phrase: "  kubernetes ".to_string(),
                boost: 4.0,
            },
            SpeechPhrase {
                phrase: "   ".to_string(),
                boost: 2.0,
            },
        ];
        let request = initial_config_request(&cfg);
        let config = config_of(&request);
        assert_eq!(config.speech_contexts.len(), 1);
        assert_eq!(config.speech_contexts[0].phrases, vec!["kubernetes"]);
        assert_eq!(config.speech_contexts[0].boost, 4.0);
    }

    #[test]
    fn interim_then_final_merges_into_segments() {
        let merged = Mutex::new(Merged::default());
        let respond = |text: &str, is_final: bool| StreamingRecognizeResponse {
            results: vec![super::super::proto::StreamingRecognitionResult {
                alternatives: vec![super::super::proto::SpeechRecognitionAlternative {
                    transcript: text.to_string(),
                    confidence: 0.9,
                }],
                is_final,
                stability: 0.0,
                audio_processed: 0.0,
            }],
        };

        record_response(&merged, &respond("hello wor", false), None);
        record_response(&merged, &respond("hello world", true), None);
        record_response(&merged, &respond("second phrase", false), None);

        let merged = merged.lock().unwrap();
        assert_eq!(merged.segments, vec!["hello world".to_string()]);
        assert_eq!(merged.last_interim, "second phrase");
        assert_eq!(
            collect_segments(&merged.segments, &merged.last_interim),
            vec!["hello world".to_string(), "second phrase".to_string()]
        );
    }
}
