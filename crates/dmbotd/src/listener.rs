//! Unix socket listener for dmbotd.
//!
//! Accepts client connections, reads one command envelope per connection,
//! dispatches it through the [`Router`] and writes the response back.

use crate::config::Config;
use crate::router::Router;
use anyhow::Result;
use dmbot_lib::Response;
use std::fs as stdfs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use crate::supervisor::backoff;

/// Largest accepted request, in bytes.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1 MiB
/// Time a client has to send its request and half-close.
pub const CLIENT_READ_TIMEOUT_SECS: u64 = 5;

/// Prepare a Unix domain socket for the listener.
///
/// Removes any stale file at `path` before binding and sets its permissions to
/// `0o660`.
///
/// # Errors
///
/// Fails if the stale file cannot be removed or the socket cannot be bound.
pub fn prepare_listener(path: &Path) -> Result<UnixListener> {
    // Remove any stale socket without a race-prone existence check.
    match stdfs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
        Err(_) => {}
    }
    if let Some(dir) = path.parent() {
        stdfs::create_dir_all(dir)?;
    }
    let listener = UnixListener::bind(path)?;
    stdfs::set_permissions(path, stdfs::Permissions::from_mode(0o660))?;
    Ok(listener)
}

/// Listen on the Unix socket and spawn a handler for each client.
///
/// Each connection is handled concurrently by [`handle_client`]; the router
/// itself serializes the commands. The function exits when `shutdown` is
/// cancelled.
///
/// # Errors
/// Returns an error if the socket cannot be created. Exiting due to a
/// shutdown signal is normal and not treated as an error.
pub async fn run_listener(
    config: Arc<Config>,
    router: Arc<Router>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = prepare_listener(&config.socket_path)?;
    tracing::info!(socket = %config.socket_path.display(), "Listening for commands");
    let min_delay = Duration::from_millis(config.restart_min_delay_ms);
    let mut accept_backoff = backoff(min_delay);

    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, _)) => {
                    accept_backoff = backoff(min_delay);
                    let cred = stream.peer_cred().ok();
                    let pid = cred.as_ref().and_then(tokio::net::unix::UCred::pid);
                    let uid = cred.as_ref().map(tokio::net::unix::UCred::uid);
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, router).await {
                            tracing::warn!(?pid, ?uid, error = %e, "Client handling failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept client connection");
                    let delay = accept_backoff.next().unwrap_or(min_delay);
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {},
                        () = shutdown.cancelled() => break,
                    }
                }
            },
            () = shutdown.cancelled() => {
                break;
            }
        }
    }
    Ok(())
}

/// Read one envelope from `stream`, dispatch it and write the response.
///
/// The client sends a JSON [`dmbot_lib::CommandEnvelope`] and half-closes
/// the connection. Requests that are too large or too slow are answered
/// with an error response when the peer still listens.
///
/// # Errors
/// Fails if reading or writing the socket fails, or if the request broke
/// the size or time limit.
pub async fn handle_client(mut stream: UnixStream, router: Arc<Router>) -> Result<()> {
    let buffer = match read_request(&mut stream).await {
        Ok(buffer) => buffer,
        Err(e) => {
            let reply = Response::error(format!("Error during message reception: {e}"));
            // Best effort: the peer may already be gone.
            let _ = write_response(&mut stream, &reply).await;
            return Err(e);
        }
    };
    let response = router.dispatch_bytes(&buffer).await;
    write_response(&mut stream, &response).await
}

async fn read_request(stream: &mut UnixStream) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(8 * 1024);
    let mut limited = (&mut *stream).take(MAX_REQUEST_BYTES as u64 + 1);
    tokio::time::timeout(
        Duration::from_secs(CLIENT_READ_TIMEOUT_SECS),
        limited.read_to_end(&mut buffer),
    )
    .await
    .map_err(|_| anyhow::anyhow!("client read timed out"))??;
    if buffer.len() > MAX_REQUEST_BYTES {
        anyhow::bail!("client payload exceeds {} bytes", MAX_REQUEST_BYTES);
    }
    Ok(buffer)
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let bytes = serde_json::to_vec(response)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}
