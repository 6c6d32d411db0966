//! Tests for task supervision and failure logging.

use super::{backoff, log_task_failure, supervise_task};
use anyhow::anyhow;
use rstest::rstest;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_support::logging::LogBuffer;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Create a [`JoinError`] representing a cancelled task.
fn create_cancelled_join_error() -> JoinError {
    tokio::runtime::Runtime::new()
        .expect("create runtime")
        .block_on(async {
            let handle = tokio::spawn(async {});
            handle.abort();
            handle.await.expect_err("aborted task")
        })
}

#[rstest]
#[case(Ok(Ok(())), None)]
#[case(Ok(Err(anyhow!("boom"))), Some(("inner_error", "boom")))]
#[case(Err(create_cancelled_join_error()), Some(("join_error", "cancel")))]
fn logs_failures(
    #[case] res: std::result::Result<anyhow::Result<()>, JoinError>,
    #[case] expected: Option<(&str, &str)>,
) {
    use tracing_subscriber::prelude::*;

    let buf = LogBuffer::default();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(buf.clone())
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR),
    );
    tracing::subscriber::with_default(subscriber, || {
        log_task_failure("task", &res);
    });

    let output = buf.contents();
    match expected {
        None => assert!(output.is_empty()),
        Some((kind, err)) => {
            let line = output.lines().next().expect("log entry");
            let v: Value = serde_json::from_str(line).expect("json");
            let fields = &v["fields"];
            assert_eq!(fields["task"], "task");
            assert_eq!(fields["kind"], kind);
            assert!(fields["error"].as_str().expect("error str").contains(err));
            assert_eq!(fields["message"], "Task failed");
        }
    }
}

#[tokio::test]
async fn restarts_failed_task_until_shutdown() {
    let shutdown = CancellationToken::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let spawn = {
        let attempts = Arc::clone(&attempts);
        let shutdown = shutdown.clone();
        move || {
            let attempts = Arc::clone(&attempts);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow!("fail"))
                } else {
                    shutdown.cancelled().await;
                    Ok(())
                }
            })
        }
    };
    let min_delay = Duration::from_millis(1);
    let first = spawn.clone()();
    let supervisor = tokio::spawn(supervise_task(
        "task",
        first,
        backoff(min_delay),
        spawn,
        shutdown.clone(),
        move || backoff(min_delay),
    ));
    while attempts.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();
    supervisor.await.expect("supervisor");
    assert!(attempts.load(Ordering::SeqCst) >= 2);
}
