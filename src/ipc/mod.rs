//! Single-instance unix-socket protocol plus server/client helpers.

mod client;
mod server;
mod socket;

pub use client::{probe, send, SendError};
pub use server::{serve, Handler};
pub use socket::{acquire, runtime_socket_path, AlreadyRunning, Rescue};

use serde::{Deserialize, Serialize};

/// One command sent over the local unix-domain socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Request {
            command: command.into(),
        }
    }
}

/// The normalized command outcome returned by the owner session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
