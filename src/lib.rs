pub mod app;
pub mod asr;
pub mod audio;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod fsm;
pub mod hypr;
pub mod indicator;
pub mod ipc;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod transcript;
pub mod version;

pub use audio::{AudioBackend, Capture, CaptureStream, Device, PcmSink, Selection};
pub use config::Config;
pub use ipc::{Request, Response};
pub use session::{Committer, Controller, Indicator, RunResult, StopResult, Transcriber};
