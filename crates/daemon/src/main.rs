// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use pixoo_fleetd::config::{FleetConfig, LogFormat};
use pixoo_fleetd::StartupError;

/// Initialize tracing from config. Priority: `--log-level`/env > `RUST_LOG`
/// > "info", mirroring the teacher's `init_tracing` (`crates/cli/src/run.rs`).
/// Uses `try_init` so repeated calls (e.g. from tests) are harmless.
fn init_tracing(config: &FleetConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = match config.log_format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Text => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[derive(Parser)]
#[command(name = "pixoo-fleetd", version, about = "Per-device scene scheduler and driver daemon for pixel-matrix displays.")]
struct Cli {
    #[command(flatten)]
    config: FleetConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.config);

    match pixoo_fleetd::run(cli.config).await {
        Ok(()) => std::process::exit(0),
        Err(StartupError::Config(e)) => {
            error!("configuration error: {e:#}");
            std::process::exit(1);
        }
        Err(StartupError::Runtime(e)) => {
            error!("fatal runtime error: {e:#}");
            std::process::exit(2);
        }
    }
}
