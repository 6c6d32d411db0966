//! Behavioural test steps driving the command router directly.
#![expect(clippy::expect_used, reason = "simplify test failure output")]

use std::sync::Arc;

use cucumber::{World, given, then, when};
use dmbot_lib::{CommandEnvelope, Response, Status};
use dmbotd::config::Config;
use dmbotd::lifecycle::{Lifecycle, WorkerState};
use dmbotd::logs::JsonLogFile;
use dmbotd::router::Router;
use dmbotd::store::{ConfigStore, YamlFileBackend};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::ObedientBot;

const REMAINING_FORMS: [(&str, &str); 4] = [
    ("quotasForm", r#"{"activated":true,"dm_day":20,"dm_hour":2}"#),
    (
        "schedulerForm",
        r#"{"windows":[{"begin_at":"00:00","end_at":"23:59"}]}"#,
    ),
    ("dmSettingsForm", r#"{"dm_templates":["Hello!"]}"#),
    (
        "dmUserScrappingSettingsForm",
        r#"{"src_accounts":["source"],"fetch_quantity":5}"#,
    ),
];

#[derive(Default, World)]
pub struct CommandWorld {
    dir: Option<TempDir>,
    router: Option<Router>,
    shutdown: CancellationToken,
    response: Option<Response>,
}

impl std::fmt::Debug for CommandWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWorld")
            .field("dir", &self.dir)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl Drop for CommandWorld {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl CommandWorld {
    fn router(&self) -> &Router {
        self.router.as_ref().expect("router not built")
    }

    async fn send(&mut self, kind: &str, payload: Option<&str>) -> Response {
        let envelope = match payload {
            Some(json) => {
                CommandEnvelope::with_raw_payload(kind, json.to_owned()).expect("payload json")
            }
            None => CommandEnvelope {
                kind: kind.to_owned(),
                payload: None,
            },
        };
        self.router().dispatch(envelope).await
    }

    fn response(&self) -> &Response {
        self.response.as_ref().expect("no response received")
    }
}

#[given("a command router with an obedient bot")]
fn a_router(world: &mut CommandWorld) {
    let dir = TempDir::new().expect("tempdir");
    let store = ConfigStore::open(Arc::new(YamlFileBackend::new(dir.path()))).expect("store");
    let lifecycle = Lifecycle::new(
        Arc::new(ObedientBot),
        world.shutdown.clone(),
        &Config::default(),
    );
    let logs = Arc::new(JsonLogFile::new(dir.path().join("dmbotd.log")));
    world.router = Some(Router::new(store, lifecycle, logs));
    world.dir = Some(dir);
}

#[given("the credentials are configured")]
async fn credentials_configured(world: &mut CommandWorld) {
    let res = world
        .send("igCredentialsForm", Some(r#"{"username":"a","password":"b"}"#))
        .await;
    assert!(res.is_success(), "{}", res.message);
}

#[given("the remaining sections are configured")]
async fn remaining_configured(world: &mut CommandWorld) {
    for (kind, json) in REMAINING_FORMS {
        let res = world.send(kind, Some(json)).await;
        assert!(res.is_success(), "{kind}: {}", res.message);
    }
}

#[when(regex = r#"^the front-end sends "(\w+)" with payload '(.+)'$"#)]
async fn sends_with_payload(world: &mut CommandWorld, kind: String, json: String) {
    world.response = Some(world.send(&kind, Some(&json)).await);
}

#[when(regex = r#"^the front-end sends "(\w+)"$"#)]
async fn sends(world: &mut CommandWorld, kind: String) {
    world.response = Some(world.send(&kind, None).await);
}

#[when("the bot finishes initializing")]
async fn bot_initialized(world: &mut CommandWorld) {
    let mut state = world.router().watch_worker().await.expect("live worker");
    state
        .wait_for(|s| *s == WorkerState::Running)
        .await
        .expect("state sender alive");
}

#[then(regex = r#"^the response is a success with message "(.+)"$"#)]
fn success_with(world: &mut CommandWorld, message: String) {
    let res = world.response();
    assert_eq!(res.status, Status::Success, "{}", res.message);
    assert_eq!(res.message, message);
}

#[then(regex = r#"^the response is an error containing "(.+)"$"#)]
fn error_containing(world: &mut CommandWorld, fragment: String) {
    let res = world.response();
    assert_eq!(res.status, Status::Error, "{}", res.message);
    assert!(res.message.contains(&fragment), "{}", res.message);
}

#[then(regex = r#"^the bot state is "(\w+)"$"#)]
async fn bot_state_is(world: &mut CommandWorld, expected: String) {
    let state = world.router().worker_state().await;
    assert_eq!(format!("{state:?}"), expected);
}
