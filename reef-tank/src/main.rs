//! Reef Tank (reef-tank) - Main entry point
//!
//! Loads the scene configuration, builds the audio graph and tile board, and
//! serves the control API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reef_common::config::{ConfigResolver, OutputDriver};
use reef_tank::api::{self, AppContext};
use reef_tank::audio::graph::AudioContext;
use reef_tank::audio::output::{NullOutput, Output, NULL_BLOCK_FRAMES};
use reef_tank::transport;
use reef_tank::SharedState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for reef-tank
#[derive(Parser, Debug)]
#[command(name = "reef-tank")]
#[command(about = "Headless host for the Reef aquarium scene")]
#[command(version)]
struct Args {
    /// Scene configuration file (TOML)
    #[arg(short, long, env = "REEF_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides [server].bind)
    #[arg(short, long, env = "REEF_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reef_tank=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting reef-tank {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ConfigResolver::new(args.config)
        .load()
        .context("Failed to load scene configuration")?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let audio = Arc::new(AudioContext::new(config.audio.sample_rate));
    let output = start_output(&config.audio.output, Arc::clone(&audio));

    let transport =
        transport::transport_for(&config.audio).context("Failed to set up asset transport")?;
    info!("Assets from {}", config.audio.asset_base);

    let state = Arc::new(
        SharedState::new(&config, Arc::clone(&audio), transport)
            .context("Failed to build scene")?,
    );

    let ctx = AppContext {
        state: Arc::clone(&state),
    };
    let served = api::run(&bind, ctx, shutdown_signal()).await;

    state.shutdown();
    output.stop();

    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Start the configured output driver, falling back to the null driver
fn start_output(driver: &OutputDriver, audio: Arc<AudioContext>) -> Output {
    match driver {
        OutputDriver::Null => Output::Null(NullOutput::start(audio, NULL_BLOCK_FRAMES)),
        #[cfg(feature = "device-output")]
        OutputDriver::Device => {
            match reef_tank::audio::output::DeviceOutput::start(Arc::clone(&audio)) {
                Ok(device) => Output::Device(device),
                Err(e) => {
                    error!("Audio device unavailable, using null output: {}", e);
                    Output::Null(NullOutput::start(audio, NULL_BLOCK_FRAMES))
                }
            }
        }
        #[cfg(not(feature = "device-output"))]
        OutputDriver::Device => {
            warn!("Built without the device-output feature, using null output");
            Output::Null(NullOutput::start(audio, NULL_BLOCK_FRAMES))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
