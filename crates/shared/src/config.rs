//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Domain event publishing configuration.
    #[serde(default)]
    pub events: EventsConfig,
    /// Log output configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait while establishing a connection.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a pooled connection to free up.
    #[serde(default = "default_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    8
}

/// Domain event publishing configuration.
///
/// When disabled, ledger writes still succeed; they just emit no events.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Whether a publisher is wired in at all.
    #[serde(default)]
    pub enabled: bool,
    /// Routing key attached to transaction-logged events.
    #[serde(default = "default_routing_key")]
    pub routing_key: String,
    /// Buffered events per subscriber before the slowest one starts lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_routing_key() -> String {
    "transaction.logged".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            routing_key: default_routing_key(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "coffer=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_filter(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("COFFER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
