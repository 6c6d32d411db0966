//! Library utilities for the `dmbot` CLI.

use clap::Parser;
use dmbot_lib::{CommandKind, DEFAULT_SOCKET_PATH};
use std::fs;
use std::path::PathBuf;

mod client;

pub use client::{ClientError, run};

/// Command line arguments for the `dmbot` client.
#[derive(Debug, Clone, Parser)]
#[command(name = "dmbot", about = "Send a command to the dmbot daemon")]
pub struct Args {
    /// The command to send (e.g. "launchDmBot", "quotasForm").
    pub kind: CommandKind,

    /// JSON payload for form commands.
    #[arg(long, conflicts_with = "payload_file")]
    pub payload: Option<String>,

    /// Read the JSON payload from a file.
    #[arg(long, value_name = "FILE")]
    pub payload_file: Option<PathBuf>,

    /// Path to the daemon's Unix Domain Socket.
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
}

impl Args {
    /// Arguments for `kind` without a payload, using `socket`.
    pub fn new(kind: CommandKind, socket: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            payload: None,
            payload_file: None,
            socket: socket.into(),
        }
    }

    /// The payload text given on the command line or in a file.
    fn payload_text(&self) -> Result<Option<String>, ClientError> {
        if let Some(json) = &self.payload {
            return Ok(Some(json.clone()));
        }
        self.payload_file
            .as_ref()
            .map(|path| {
                fs::read_to_string(path).map_err(|source| ClientError::PayloadFile {
                    path: path.clone(),
                    source,
                })
            })
            .transpose()
    }
}
