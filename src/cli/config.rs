//! wabridge configuration file handling
//!
//! Provides default configuration generation and loading for the bridge.
//! Configuration files are TOML format and stored adjacent to the credential
//! store.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wabridge::messaging::LoopbackConfig;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP trigger address
const DEFAULT_LISTEN: &str = "0.0.0.0:8081";

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Credential store configuration
    pub store: StoreConfig,

    /// Pairing behaviour
    #[serde(default)]
    pub device: DeviceConfig,

    /// HTTP trigger configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Loopback backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Credential store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite credential store
    pub path: PathBuf,
}

/// Pairing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceConfig {
    /// Give up pairing after this long (e.g. "3m"); unset waits for the backend
    pub pairing_timeout: Option<String>,
}

/// HTTP trigger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address the trigger listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// Loopback backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Phone number of the simulated account
    #[serde(default = "default_phone")]
    pub phone: String,

    /// Delay before a shown pairing code counts as scanned
    #[serde(default = "default_approve_after")]
    pub approve_after: String,

    /// Deliver sent messages back as inbound messages
    #[serde(default)]
    pub echo: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

fn default_phone() -> String {
    LoopbackConfig::default().phone
}

fn default_approve_after() -> String {
    "5s".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            phone: default_phone(),
            approve_after: default_approve_after(),
            echo: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: BridgeConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Load the config at `config_path`, generating a default one first if missing
    pub fn load_or_create(
        config_path: &Path,
        store_path: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if !config_path.exists() {
            println!("📝 No config file found. Creating default configuration...");
            Self::create_default(config_path, store_path)?;
            println!("   Created: {}", config_path.display());
        }
        Self::load(config_path)
    }

    /// Parsed pairing deadline
    pub fn pairing_timeout(&self) -> Result<Option<Duration>, Box<dyn std::error::Error>> {
        self.device
            .pairing_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw)
                    .map_err(|e| format!("Invalid device.pairing_timeout '{}': {}", raw, e).into())
            })
            .transpose()
    }

    /// Loopback backend settings
    pub fn loopback_config(&self) -> Result<LoopbackConfig, Box<dyn std::error::Error>> {
        let approve_after = humantime::parse_duration(&self.backend.approve_after).map_err(|e| {
            format!(
                "Invalid backend.approve_after '{}': {}",
                self.backend.approve_after, e
            )
        })?;

        Ok(LoopbackConfig {
            phone: self.backend.phone.clone(),
            approve_after,
            echo: self.backend.echo,
            ..LoopbackConfig::default()
        })
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(store_path: &Path) -> String {
        format!(
            r#"# wabridge Configuration
#
# One bridge process owns one paired device. Pairing happens on first start
# (a QR code is printed); later starts reconnect with the stored identity.

[store]
# Path to the SQLite credential store
path = "{store_path}"

[device]
# Give up pairing after this long (humantime syntax, e.g. "90s", "3m").
# Leave commented to wait until the backend ends the attempt.
# pairing_timeout = "3m"

[http]
# Address of the HTTP trigger: GET /?JID=<recipient>&message=<text>
listen = "{listen}"

[backend]
# Loopback backend: simulated account used for local runs
phone = "{phone}"
# Delay before a shown pairing code counts as scanned
approve_after = "5s"
# Deliver every sent message back as an inbound message
echo = false

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/wabridge/wabridge.log"
"#,
            store_path = store_path.display(),
            listen = DEFAULT_LISTEN,
            phone = default_phone(),
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        store_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(store_path);

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default credential store path
///
/// - `~/.local/share/wabridge/store.db` on Linux
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wabridge")
        .join("store.db")
}

/// Get the default config file path based on the store path
///
/// The config file sits next to the store:
/// - Store: ~/.local/share/wabridge/store.db
/// - Config: ~/.local/share/wabridge/config.toml
pub fn default_config_path(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .unwrap_or(store_path)
        .join("config.toml")
}
