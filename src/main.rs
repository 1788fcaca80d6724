use std::process;

use clap::Parser;
use commitsmith::cli::error_report;
use commitsmith::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries only the generated message.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = Cli::parse().execute().await {
        eprintln!("{}", error_report(&e));
        process::exit(1);
    }
}
