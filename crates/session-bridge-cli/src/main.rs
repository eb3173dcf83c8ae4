//! Session Bridge CLI
//!
//! One action per invocation; the result is printed to stdout as JSON and
//! logs go to stderr.

use clap::Parser;
use session_bridge_cli::{execute, Cli};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_LEVEL_ENV: &str = "BRIDGE_LOG_LEVEL";

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    debug!("session-bridge v{}", env!("CARGO_PKG_VERSION"));

    let outcome = execute(cli);

    let text = serde_json::to_string_pretty(&outcome.body)
        .unwrap_or_else(|_| outcome.body.to_string());
    println!("{}", text);

    ExitCode::from(outcome.exit_code)
}
