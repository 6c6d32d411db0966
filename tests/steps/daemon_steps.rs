//! Behavioural test steps running the daemon and talking to it with the
//! `dmbot` client.
#![expect(clippy::expect_used, reason = "simplify test failure output")]

use std::path::PathBuf;
use std::sync::Arc;

use cucumber::{World, given, then, when};
use dmbot::Args;
use dmbot_lib::{CommandKind, Response, Status};
use dmbotd::config::{Config, SETTINGS_FILE_NAME};
use dmbotd::supervisor::run_until;
use tempfile::TempDir;
use test_support::{SOCKET_RETRY_COUNT, SOCKET_RETRY_DELAY, wait_for_file};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ObedientBot;

#[derive(Debug, Default, World)]
pub struct DaemonWorld {
    dir: Option<TempDir>,
    socket: PathBuf,
    data_dir: PathBuf,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<dmbotd::supervisor::Result<()>>>,
    response: Option<Response>,
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl DaemonWorld {
    async fn send(&mut self, kind: &str, payload: Option<String>) {
        let kind: CommandKind = kind.parse().expect("known command");
        let mut args = Args::new(kind, &self.socket);
        args.payload = payload;
        self.response = Some(dmbot::run(args).await.expect("client run"));
    }

    fn response(&self) -> &Response {
        self.response.as_ref().expect("no response received")
    }
}

#[given("a running daemon")]
async fn a_running_daemon(world: &mut DaemonWorld) {
    let dir = TempDir::new().expect("tempdir");
    let cfg = Config {
        socket_path: dir.path().join("run/dmbot.sock"),
        data_dir: dir.path().join("data"),
        log_dir: dir.path().join("log"),
        restart_min_delay_ms: 10,
        ..Config::default()
    };
    world.socket = cfg.socket_path.clone();
    world.data_dir = cfg.data_dir.clone();
    world.handle = Some(tokio::spawn(run_until(
        cfg,
        Arc::new(ObedientBot),
        world.shutdown.clone(),
    )));
    assert!(
        wait_for_file(&world.socket, SOCKET_RETRY_COUNT, SOCKET_RETRY_DELAY).await,
        "socket not created"
    );
    world.dir = Some(dir);
}

#[when(regex = r#"^the client sends "(\w+)" with payload '(.+)'$"#)]
async fn client_sends_with_payload(world: &mut DaemonWorld, kind: String, json: String) {
    world.send(&kind, Some(json)).await;
}

#[when(regex = r#"^the client sends "(\w+)"$"#)]
async fn client_sends(world: &mut DaemonWorld, kind: String) {
    world.send(&kind, None).await;
}

#[then(regex = r#"^the client receives a success with message "(.+)"$"#)]
fn client_success(world: &mut DaemonWorld, message: String) {
    let res = world.response();
    assert_eq!(res.status, Status::Success, "{}", res.message);
    assert_eq!(res.message, message);
}

#[then(regex = r#"^the client receives an error containing "(.+)"$"#)]
fn client_error(world: &mut DaemonWorld, fragment: String) {
    let res = world.response();
    assert_eq!(res.status, Status::Error, "{}", res.message);
    assert!(res.message.contains(&fragment), "{}", res.message);
}

#[then("no settings file remains")]
async fn no_settings_file(world: &mut DaemonWorld) {
    assert!(!world.data_dir.join(SETTINGS_FILE_NAME).exists());
    world.shutdown.cancel();
    if let Some(handle) = world.handle.take() {
        handle.await.expect("join").expect("daemon result");
    }
}
