//! Session orchestration: lifecycle state, actions, and commit flow.

mod controller;

pub use controller::Controller;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fsm;

/// Runtime transcriber wiring is missing or already released.
#[derive(Debug, Error)]
#[error("audio capture and ASR pipeline not available")]
pub struct PipelineUnavailable;

/// Stop completed but no usable speech was recognized.
#[derive(Debug, Error)]
#[error("no speech recognized; check microphone input or mute state")]
pub struct EmptyTranscript;

/// Transcriber output consumed by the session controller.
#[derive(Debug, Clone, Default)]
pub struct StopResult {
    pub transcript: String,
    pub audio_device: String,
    pub bytes_captured: u64,
    pub grpc_latency: Duration,
}

/// Stop failure carrying the metrics gathered before the error.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct StopFailure {
    pub audio_device: String,
    pub bytes_captured: u64,
    pub grpc_latency: Duration,
    #[source]
    pub source: anyhow::Error,
}

impl StopFailure {
    pub fn bare(source: anyhow::Error) -> Self {
        StopFailure {
            audio_device: String::new(),
            bytes_captured: 0,
            grpc_latency: Duration::ZERO,
            source,
        }
    }
}

/// Capture/ASR operations needed by session orchestration.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn start(&self, cancel: &CancellationToken) -> Result<()>;
    async fn stop_and_transcribe(&self) -> Result<StopResult, StopFailure>;
    async fn cancel(&self);
}

/// Dispatches a transcript when session stop succeeds.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, transcript: &str) -> Result<()>;
}

/// Session-facing indicator behavior. Cue methods are fire-and-forget.
#[async_trait]
pub trait Indicator: Send + Sync {
    async fn show_recording(&self);
    async fn show_transcribing(&self);
    async fn show_error(&self, text: &str);
    fn cue_stop(&self);
    fn cue_complete(&self);
    fn cue_cancel(&self);
    async fn hide(&self);
    fn focused_monitor(&self) -> String;
}

/// The complete lifecycle output returned by one [`Controller::run`].
#[derive(Debug)]
pub struct RunResult {
    pub state: fsm::State,
    pub transcript: String,
    pub cancelled: bool,
    pub err: Option<anyhow::Error>,
    pub audio_device: String,
    pub bytes_captured: u64,
    pub grpc_latency: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub focused_monitor: String,
}

impl RunResult {
    fn new(started_at: DateTime<Utc>) -> Self {
        RunResult {
            state: fsm::State::Idle,
            transcript: String::new(),
            cancelled: false,
            err: None,
            audio_device: String::new(),
            bytes_captured: 0,
            grpc_latency: Duration::ZERO,
            started_at,
            finished_at: started_at,
            focused_monitor: String::new(),
        }
    }
}
