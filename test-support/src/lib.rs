//! Helpers shared by the dmbot test suites.
//!
//! Temporary daemon configurations, environment guards, in-memory log
//! capture and polling for the daemon socket.

pub mod daemon;
pub mod env_guard;
pub mod logging;
pub mod util;

pub use daemon::{TestConfig, temp_config};
pub use util::{SOCKET_RETRY_COUNT, SOCKET_RETRY_DELAY, wait_for_file};
