use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

pub mod config;
pub mod logging;
pub mod pair;
pub mod send;
pub mod serve;
pub mod session;
pub mod status;
pub mod unregister;
pub mod version;

use config::{default_config_path, default_store_path, BridgeConfig};

#[derive(Parser)]
#[command(name = "wabridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bridge a paired messaging device to HTTP and the command line", long_about = None)]
pub struct Cli {
    /// Path to config file (default: adjacent to the store at ~/.local/share/wabridge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Path to the credential store (optional, uses default if not specified)
    #[arg(long, global = true)]
    pub store_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pair as a linked device by scanning a QR code
    Pair,

    /// Serve the HTTP trigger: GET /?JID=<recipient>&message=<text>
    Serve {
        /// Listen address (overrides [http] listen)
        #[arg(long)]
        listen: Option<SocketAddr>,
    },

    /// Send one message, then keep listening until interrupted
    Send {
        /// Recipient JID, e.g. 123456789@s.whatsapp.net
        #[arg(long, env = "RECIPIENT")]
        recipient: String,

        /// Message text
        #[arg(long, default_value = send::DEFAULT_MESSAGE)]
        message: String,

        /// Disconnect right after the send instead of waiting for a signal
        #[arg(long)]
        no_wait: bool,
    },

    /// Show pairing status
    Status,

    /// Forget the stored identity
    Unregister {
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Display version information
    Version,
}

/// Resolve store and config paths, then load (or create) the config
///
/// `--store-path` wins over the store path written in the config file.
pub fn resolve_config(
    config_path: Option<String>,
    store_path: Option<String>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    let store_override = store_path.map(PathBuf::from);
    let store_path = store_override.clone().unwrap_or_else(default_store_path);

    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path(&store_path));

    let mut config = BridgeConfig::load_or_create(&config_path, &store_path)?;
    if let Some(path) = store_override {
        config.store.path = path;
    }

    Ok(config)
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Version = cli.command {
        version::execute();
        return Ok(());
    }

    let config = resolve_config(cli.config, cli.store_path)?;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Pair => pair::execute(&config).await,
        Commands::Serve { listen } => serve::execute(&config, listen).await,
        Commands::Send {
            recipient,
            message,
            no_wait,
        } => send::execute(&config, &recipient, &message, no_wait).await,
        Commands::Status => status::execute(&config).await,
        Commands::Unregister { yes } => unregister::execute(&config, yes).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
