//! Client-side communication with the `dmbotd` daemon.
//!
//! This module builds a command envelope, sends it over the daemon's Unix
//! Domain Socket and reads back the single response. It is separated from
//! `lib.rs` so that argument parsing remains focused and the network logic
//! is easily testable.

use std::path::PathBuf;

use dmbot_lib::{CommandEnvelope, Response};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::warn;

use crate::Args;

/// Errors that can occur when interacting with the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The payload file could not be read.
    #[error("failed to read payload file {}: {source}", .path.display())]
    PayloadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    /// Connecting to the daemon failed.
    #[error("failed to connect to daemon: {0}")]
    Connect(#[from] std::io::Error),
    /// Serializing the request failed.
    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Writing the request to the socket failed.
    #[error("failed to write to daemon: {0}")]
    Write(#[source] std::io::Error),
    /// Shutting down the socket failed.
    #[error("failed to close connection: {0}")]
    Shutdown(#[source] std::io::Error),
    /// Reading the response failed.
    #[error("failed to read response: {0}")]
    Read(#[source] std::io::Error),
    /// The daemon's reply is not a response envelope.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Send one command to the daemon and return its response.
///
/// # Examples
///
/// ```no_run
/// # use dmbot::{Args, run};
/// # use dmbot_lib::CommandKind;
/// # async fn try_run() -> Result<(), dmbot::ClientError> {
/// let args = Args::new(CommandKind::LaunchDmBot, "/run/dmbot/dmbot.sock");
/// let response = run(args).await?;
/// println!("{}", response.message);
/// # Ok(())
/// # }
/// ```
pub async fn run(args: Args) -> Result<Response, ClientError> {
    let envelope = match args.payload_text()? {
        Some(json) => CommandEnvelope::with_raw_payload(args.kind.as_str(), json)
            .map_err(ClientError::InvalidPayload)?,
        None => CommandEnvelope::new(args.kind),
    };
    let request = serde_json::to_vec(&envelope)?;

    let mut stream = UnixStream::connect(&args.socket)
        .await
        .map_err(ClientError::Connect)?;
    stream
        .write_all(&request)
        .await
        .map_err(ClientError::Write)?;
    if let Err(e) = stream.shutdown().await {
        warn!("failed to close connection: {e}");
        return Err(ClientError::Shutdown(e));
    }

    let mut reply = Vec::new();
    stream
        .read_to_end(&mut reply)
        .await
        .map_err(ClientError::Read)?;
    serde_json::from_slice(&reply).map_err(ClientError::Decode)
}
