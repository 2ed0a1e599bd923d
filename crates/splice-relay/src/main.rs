//! Splice relay - shared-state websocket relay and transcription server
//!
//! Routes:
//! - `GET /ws`: relay socket with last-state replay
//! - `POST /transcribe`: multipart `video` upload, answers with the upload name
//! - `POST /sensors`: hardware knob readings
//! - `GET /uploads/*`: transcoded videos and alignments

mod app;
mod config;
mod hub;
mod sensors;
mod transcribe;
mod ws;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use splice_core::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "splice-relay", version, about = "Splice relay server")]
struct Args {
    /// Listen address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Directory for uploads (overrides the config file)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Config file (default: ~/.config/splice/relay.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let mut config: config::RelayConfig = load_config(&config_path);
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(dir) = args.upload_dir {
        config.upload_dir = dir;
    }

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating upload dir {:?}", config.upload_dir))?;

    let bind = config.bind.clone();
    let state = app::AppState::new(config).context("building aligner client")?;
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    log::info!("splice-relay listening on {}", bind);

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
