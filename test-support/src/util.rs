//! Polling helpers for tests that start the daemon in the background.

use std::path::Path;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};

/// Number of polls used when waiting for the daemon socket.
pub const SOCKET_RETRY_COUNT: u32 = 200;
/// Delay between socket polls.
pub const SOCKET_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Poll every `delay` until `path` exists, at most `tries` times.
///
/// Returns `false` if the path never appeared.
///
/// ```rust,ignore
/// use test_support::{SOCKET_RETRY_COUNT, SOCKET_RETRY_DELAY, wait_for_file};
///
/// assert!(wait_for_file(&cfg.socket_path, SOCKET_RETRY_COUNT, SOCKET_RETRY_DELAY).await);
/// ```
pub async fn wait_for_file(path: &Path, tries: u32, delay: Duration) -> bool {
    let mut ticker = interval(delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for _ in 0..tries {
        ticker.tick().await;
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return true;
        }
    }
    false
}
