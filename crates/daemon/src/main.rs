// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sandboxd — background process that owns the warm pool scheduler and
//! reconciler for a set of container-backed sandboxes.
//!
//! This binary has no request listener of its own (spec §1 puts the HTTP/
//! gRPC/CLI surface out of scope): it loads configuration, wires the
//! engine's managers to a concrete driver, and runs the background loops
//! until it's asked to stop.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod lifecycle;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::lifecycle::App;

#[derive(Debug, Parser)]
#[command(name = "sandboxd", about = "Multi-tenant sandbox orchestrator daemon")]
struct Cli {
    /// Path to a TOML config file. Defaults to `SANDBOXD_CONFIG_FILE`, then `./sandboxd.toml`.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&config.state_dir)?;
    info!(state_dir = %config.state_dir.display(), profiles = config.profiles.len(), "starting sandboxd");

    let app = Arc::new(App::build(&config).await?);
    if let Err(e) = app.run().await {
        error!(error = %e, "sandboxd exited with an error");
        return Err(e.into());
    }

    info!("sandboxd stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
