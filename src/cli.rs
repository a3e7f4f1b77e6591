//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Local-first push-to-talk dictation for Wayland.
#[derive(Debug, Parser)]
#[command(
    name = "sotto",
    about = "Local-first push-to-talk dictation for Wayland",
    disable_version_flag = true
)]
pub struct Cli {
    /// Config file path (default: $XDG_CONFIG_HOME/sotto/config.conf)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print version information
    #[arg(long)]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start recording or stop+commit when already recording
    Toggle,
    /// Stop active recording and commit transcript
    Stop,
    /// Cancel active recording and discard transcript
    Cancel,
    /// Print current state
    Status,
    /// List available input devices
    Devices,
    /// Run configuration and environment checks
    Doctor,
    /// Print version information
    Version,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Toggle => "toggle",
            Command::Stop => "stop",
            Command::Cancel => "cancel",
            Command::Status => "status",
            Command::Devices => "devices",
            Command::Doctor => "doctor",
            Command::Version => "version",
        }
    }
}
