//! Behavioural test steps for the `dmbot` argument parser.

use clap::Parser;
use cucumber::{World, given, then, when};
use std::ffi::OsString;
use std::path::PathBuf;

use dmbot::Args;

#[derive(Debug, Default, World)]
pub struct CliWorld {
    args: Vec<OsString>,
    result: Option<Result<Args, clap::Error>>,
}

#[given(regex = r#"^CLI arguments for command "(.+)"$"#)]
fn cli_args_for_command(world: &mut CliWorld, kind: String) {
    world.args = vec![OsString::from("dmbot"), OsString::from(kind)];
}

#[given("no CLI arguments")]
fn no_cli_arguments(world: &mut CliWorld) {
    world.args = vec![OsString::from("dmbot")];
}

#[given(regex = r#"^socket path "(.+)"$"#)]
fn socket_path(world: &mut CliWorld, path: String) {
    world.args.push(OsString::from("--socket"));
    world.args.push(OsString::from(path));
}

#[given(regex = r"^payload '(.+)'$")]
fn payload(world: &mut CliWorld, json: String) {
    world.args.push(OsString::from("--payload"));
    world.args.push(OsString::from(json));
}

#[when("they are parsed")]
fn they_are_parsed(world: &mut CliWorld) {
    world.result = Some(Args::try_parse_from(world.args.clone()));
}

#[then("parsing succeeds")]
fn parsing_succeeds(world: &mut CliWorld) {
    match world.result.as_ref() {
        Some(Ok(_)) => {}
        Some(Err(e)) => panic!("parse failed: {e}"),
        None => panic!("arguments were not parsed"),
    }
}

#[then("an error is returned")]
fn an_error_is_returned(world: &mut CliWorld) {
    assert!(matches!(world.result, Some(Err(_))));
}

#[then(regex = r#"^the socket path is "(.+)"$"#)]
fn the_socket_path_is(world: &mut CliWorld, expected: String) {
    match world.result.as_ref() {
        Some(Ok(args)) => assert_eq!(args.socket, PathBuf::from(expected)),
        _ => panic!("arguments were not parsed"),
    }
}
