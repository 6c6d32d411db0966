mod steps;
use cucumber::World as _;
use steps::{CliWorld, CommandWorld, DaemonWorld};

#[tokio::main]
async fn main() {
    CliWorld::run("tests/features/cli.feature").await;
    CommandWorld::run("tests/features/command_dispatch.feature").await;
    DaemonWorld::run("tests/features/daemon.feature").await;
}
