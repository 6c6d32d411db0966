//! CLI client for the dmbot daemon.
//! Sends one command and prints the daemon's answer.

use std::process::ExitCode;

use clap::Parser;
use dmbot::{Args, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(response) if response.is_success() => {
            println!("{}", response.message);
            ExitCode::SUCCESS
        }
        Ok(response) => {
            eprintln!("{}", response.message);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("dmbot: {e}");
            ExitCode::FAILURE
        }
    }
}
