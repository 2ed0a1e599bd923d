//! Splice client - headless editor/player for shared transcript remixing
//!
//! Connects to a relay, mirrors the shared session (video, editor sequence,
//! transport, knobs) and plays the sequence on the local audio device.
//! Editing and transport are driven from a line console on stdin.
//!
//! ## Command line flags
//!
//! - `--server <url>`: relay websocket URL (overrides the config file)
//! - `--role <editor|player|both>`: participation mode
//! - `--config <path>`: alternate config file
//! - `--load <url>`: load a video on start-up
//! - `--list-devices`: print output devices and exit
//! - `--save-config`: write the effective settings back to the config file

mod config;
mod connection;
mod console;
mod fetch;
mod observer;
mod runner;

use std::path::PathBuf;

use clap::Parser;
use splice_core::audio::output_device_names;
use splice_core::config::{load_config, save_config};
use splice_core::Role;

#[derive(Parser, Debug)]
#[command(name = "splice-client", version, about = "Shared transcript remixing client")]
struct Args {
    /// Relay websocket URL
    #[arg(long)]
    server: Option<String>,

    /// Participation mode
    #[arg(long)]
    role: Option<Role>,

    /// Config file (default: ~/.config/splice/client.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Video base URL to load on start-up
    #[arg(long)]
    load: Option<String>,

    /// List audio output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Persist the effective settings (file plus flags) before connecting
    #[arg(long)]
    save_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if args.list_devices {
        for name in output_device_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    let mut config: config::ClientConfig = load_config(&config_path);
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(role) = args.role {
        config.role = role;
    }
    if args.save_config {
        save_config(&config, &config_path)?;
    }
    log::info!("splice-client starting up ({} role, relay {})", config.role, config.server_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(runner::run(config, args.load))?;

    log::info!("splice-client shut down");
    Ok(())
}
