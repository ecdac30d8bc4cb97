//! wgfrontend - WireGuard roadwarrior peer management
//!
//! Command-line host for the core library: owns the single config document
//! for the duration of one command and runs mutations one at a time.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wg_roadwarrior_core::{ConfigDocument, FrontendConfig, PeerRegistry, X25519KeyProvider};

#[derive(Parser, Debug)]
#[command(name = "wgfrontend", version, about = "Manage WireGuard roadwarrior peers")]
struct Cli {
    /// Frontend settings file (defaults to the user config dir)
    #[arg(long, env = "WGFRONTEND_CONFIG")]
    config: Option<PathBuf>,

    /// WireGuard server config, overrides the settings file
    #[arg(long, env = "WGFRONTEND_WG_CONFIG")]
    wg_config: Option<PathBuf>,

    /// Directory for generated client configs, overrides the settings file
    #[arg(long)]
    libdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List all peers
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the server interface settings
    Interface {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show one peer
    Show { id: String },
    /// Create a peer with fresh keys
    Create {
        description: String,
        /// Use this address instead of the next free one
        #[arg(long)]
        address: Option<String>,
    },
    /// Change a peer's description
    Update { id: String, description: String },
    /// Delete a peer
    Delete { id: String },
    /// Print (or write) the client config for a peer
    ClientConfig {
        id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the address the next peer would get
    NextAddress,
}

fn load_settings(cli: &Cli) -> Result<FrontendConfig> {
    let mut settings = match &cli.config {
        Some(path) => FrontendConfig::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => FrontendConfig::load_or_default()?,
    };
    if let Some(path) = &cli.wg_config {
        settings.wireguard.config_file = path.clone();
    }
    if let Some(path) = &cli.libdir {
        settings.wireguard.libdir = path.clone();
    }
    settings.validate()?;
    Ok(settings)
}

fn build_registry(settings: &FrontendConfig) -> PeerRegistry {
    let registry = PeerRegistry::new(X25519KeyProvider::new(), &settings.wireguard.libdir);
    match settings.change_notifier() {
        Some(notifier) => registry.with_notifier(notifier),
        None => registry,
    }
}

fn main() -> Result<()> {
    // Set up logging
    env_logger::init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let wg_config = &settings.wireguard.config_file;

    let mut doc = ConfigDocument::load(wg_config)
        .with_context(|| format!("Failed to load WireGuard config {}", wg_config.display()))?;
    let registry = build_registry(&settings);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(&cli.command, &registry, &mut doc, &mut out)
}
