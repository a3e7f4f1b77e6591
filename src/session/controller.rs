//! The owner-side session controller: FSM state, IPC commands, run lifecycle.

use std::sync::RwLock;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::fsm::{self, Event, State};
use crate::ipc::{Handler, Request, Response};

use super::{Committer, EmptyTranscript, Indicator, RunResult, Transcriber};

const INDICATOR_HIDE_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Stop,
    Cancel,
}

/// Orchestrates session state transitions and side effects.
///
/// IPC handlers only enqueue actions; `run` consumes them. The action mailbox
/// has capacity 1 so at most one request is ever outstanding.
pub struct Controller {
    transcriber: Box<dyn Transcriber>,
    committer: Box<dyn Committer>,
    indicator: Box<dyn Indicator>,

    state: RwLock<State>,
    actions_tx: mpsc::Sender<Action>,
    actions_rx: Mutex<mpsc::Receiver<Action>>,
}

impl Controller {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        committer: Box<dyn Committer>,
        indicator: Box<dyn Indicator>,
    ) -> Self {
        let (actions_tx, actions_rx) = mpsc::channel(1);
        Controller {
            transcriber,
            committer,
            indicator,
            state: RwLock::new(State::Idle),
            actions_tx,
            actions_rx: Mutex::new(actions_rx),
        }
    }

    /// Current FSM state snapshot.
    pub fn state(&self) -> State {
        *self.state.read().expect("state lock")
    }

    /// Applies one FSM event to the controller state.
    fn transition(&self, event: Event) -> Result<(), fsm::InvalidTransition> {
        let mut state = self.state.write().expect("state lock");
        *state = fsm::transition(*state, event)?;
        Ok(())
    }

    /// Transitions to error and back to idle, best-effort.
    fn to_error_and_reset(&self) {
        let _ = self.transition(Event::Fail);
        let _ = self.transition(Event::Reset);
    }

    /// Executes one owner lifecycle from start to stop/cancel/failure.
    pub async fn run(&self, cancel: CancellationToken) -> RunResult {
        let started_at = Utc::now();
        let mut result = RunResult::new(started_at);

        if let Err(err) = self.transition(Event::Start) {
            result.state = self.state();
            result.err = Some(err.into());
            result.finished_at = Utc::now();
            return result;
        }

        self.indicator.show_recording().await;

        if let Err(err) = self.transcriber.start(&cancel).await {
            self.indicator.show_error("Unable to start recording").await;
            self.to_error_and_reset();
            result.state = self.state();
            result.err = Some(err);
            result.finished_at = Utc::now();
            result.focused_monitor = self.indicator.focused_monitor();
            return result;
        }

        let mut result = self.run_active(&cancel, result).await;
        result.finished_at = Utc::now();
        result.focused_monitor = self.indicator.focused_monitor();
        let _ = tokio::time::timeout(INDICATOR_HIDE_TIMEOUT, self.indicator.hide()).await;
        result
    }

    /// Waits for a stop/cancel action or cancellation while recording.
    async fn run_active(&self, cancel: &CancellationToken, mut result: RunResult) -> RunResult {
        let mut actions = self.actions_rx.lock().await;

        let action = tokio::select! {
            _ = cancel.cancelled() => None,
            action = actions.recv() => action,
        };
        drop(actions);

        match action {
            None => {
                self.transcriber.cancel().await;
                self.indicator.cue_cancel();
                self.indicator.show_error("Cancelled").await;
                self.to_error_and_reset();
                result.state = self.state();
                result.err = Some(anyhow!("session cancelled"));
                result
            }
            Some(Action::Cancel) => {
                self.transcriber.cancel().await;
                self.indicator.cue_cancel();
                let _ = self.transition(Event::Cancel);
                result.state = self.state();
                result.cancelled = true;
                result
            }
            Some(Action::Stop) => self.run_stop(result).await,
        }
    }

    /// The stop path: transcribe, assemble, commit.
    async fn run_stop(&self, mut result: RunResult) -> RunResult {
        if let Err(err) = self.transition(Event::Stop) {
            self.to_error_and_reset();
            result.state = self.state();
            result.err = Some(err.into());
            return result;
        }
        self.indicator.show_transcribing().await;

        let stopped = self.transcriber.stop_and_transcribe().await;
        self.indicator.cue_stop();

        let stop_result = match stopped {
            Err(failure) => {
                self.indicator.show_error("Speech recognition failed").await;
                self.to_error_and_reset();
                result.state = self.state();
                result.audio_device = failure.audio_device.clone();
                result.bytes_captured = failure.bytes_captured;
                result.grpc_latency = failure.grpc_latency;
                result.err = Some(failure.source);
                return result;
            }
            Ok(stop_result) => stop_result,
        };

        result.audio_device = stop_result.audio_device.clone();
        result.bytes_captured = stop_result.bytes_captured;
        result.grpc_latency = stop_result.grpc_latency;

        if stop_result.transcript.trim().is_empty() {
            self.indicator.show_error("No speech detected").await;
            self.to_error_and_reset();
            result.state = self.state();
            result.transcript = stop_result.transcript;
            result.err = Some(EmptyTranscript.into());
            return result;
        }

        if let Err(err) = self.committer.commit(&stop_result.transcript).await {
            self.indicator.show_error("Output dispatch failed").await;
            self.to_error_and_reset();
            result.state = self.state();
            result.transcript = stop_result.transcript;
            result.err = Some(err);
            return result;
        }
        self.indicator.cue_complete();

        if let Err(err) = self.transition(Event::Transcribed) {
            result.state = self.state();
            result.transcript = stop_result.transcript;
            result.err = Some(err.into());
            return result;
        }

        result.state = self.state();
        result.transcript = stop_result.transcript;
        result
    }

    /// Enqueues a stop action when state permits it.
    fn request_stop(&self, source: &str) -> Response {
        let state = self.state();
        if state == State::Transcribing {
            return refusal(state, "already transcribing".to_string());
        }
        if state != State::Recording {
            return refusal(state, format!("cannot {source} from state {state}"));
        }

        match self.actions_tx.try_send(Action::Stop) {
            Ok(()) => accepted(state, "stop requested"),
            Err(_) => accepted(state, "stop already requested"),
        }
    }

    /// Enqueues a cancel action when state permits it.
    fn request_cancel(&self) -> Response {
        let state = self.state();
        if state == State::Transcribing {
            return refusal(state, "cannot cancel while transcribing".to_string());
        }
        if state != State::Recording {
            return refusal(state, format!("cannot cancel from state {state}"));
        }

        match self.actions_tx.try_send(Action::Cancel) {
            Ok(()) => accepted(state, "cancel requested"),
            Err(_) => accepted(state, "cancel already requested"),
        }
    }
}

#[async_trait]
impl Handler for Controller {
    /// Serves IPC commands for the active owner session.
    async fn handle(&self, request: Request) -> Response {
        debug!(command = %request.command, "IPC command received");
        match request.command.as_str() {
            "status" => Response {
                ok: true,
                state: Some(self.state().to_string()),
                message: Some("status".to_string()),
                error: None,
            },
            "toggle" => self.request_stop("toggle"),
            "stop" => self.request_stop("stop"),
            "cancel" => self.request_cancel(),
            other => refusal(self.state(), format!("unknown command: {other}")),
        }
    }
}

fn accepted(state: State, message: &str) -> Response {
    Response {
        ok: true,
        state: Some(state.to_string()),
        message: Some(message.to_string()),
        error: None,
    }
}

fn refusal(state: State, error: String) -> Response {
    Response {
        ok: false,
        state: Some(state.to_string()),
        message: None,
        error: Some(error),
    }
}
