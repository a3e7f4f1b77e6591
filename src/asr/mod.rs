//! Streaming speech-recognition client for a local Riva-compatible backend.

pub(crate) mod merge;
mod stream;

pub use stream::{DebugResponseSink, Stream, StreamConfig};

/// Generated gRPC bindings for the recognition service.
pub mod proto {
    tonic::include_proto!("nvidia.riva.asr");
}

/// One vocabulary boost phrase in request-ready form.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechPhrase {
    pub phrase: String,
    pub boost: f32,
}
