//! Main Entrypoint for the Scholar Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing logging on stderr, since stdout carries the response protocol.
//! 3. Selecting the agent adapter and loading conversation history.
//! 4. Serving requests from stdin until it closes or Ctrl+C arrives.
//! 5. Writing the final history snapshot.

use anyhow::Context;
use clap::Parser;
use scholar_agent::{
    config::{Cli, Config},
    state::AppState,
};
use tokio::io::{BufReader, stdin, stdout};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let cli = Cli::parse();
    let config = Config::from_env()
        .context("Failed to load configuration")?
        .apply(&cli);

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing agent...");

    // --- 3. Initialize State ---
    let state = AppState::from_config(&config)?;
    info!(
        history_dir = %config.history_dir.display(),
        turns = state.history.len(),
        checkpoint_every = config.checkpoint_every,
        "Agent server is running. Waiting for input..."
    );
    let mut session = state.into_session();

    // --- 4. Serve ---
    let served = tokio::select! {
        result = session.run(BufReader::new(stdin()), stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal. Shutting down...");
            Ok(())
        }
    };

    // --- 5. Final Flush ---
    session.shutdown();
    served.context("Failed to serve requests")?;
    info!("Agent has shut down.");
    Ok(())
}
