//! Server configuration.
//!
//! Loaded with the `config` crate. Later sources override earlier ones:
//!
//! 1. compiled-in defaults ([`ServerConfig::default`])
//! 2. `vyapar.toml`, or the file named by `VYAPAR_CONFIG` (optional)
//! 3. environment variables, `VYAPAR__` prefix with `__` between levels,
//!    e.g. `VYAPAR__DATABASE__PATH=/var/lib/vyapar/pos.db`

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use vyapar_core::LoyaltyPolicy;
use vyapar_db::DbConfig;
use vyapar_realtime::SessionConfig;

/// File read when `VYAPAR_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "vyapar.toml";

/// Development signing key. The server warns when it is still in use.
pub const DEV_JWT_SECRET: &str = "vyapar-dev-secret-change-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub loyalty: LoyaltySettings,
    pub inventory: InventorySettings,
    pub realtime: RealtimeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    /// Lifetime of tokens issued by `vyapar-server token`.
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltySettings {
    /// Whole currency units spent per point earned.
    pub points_per_currency_unit: i64,
    /// Reject redemption above the customer's balance.
    pub strict_redemption: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Default window for the expiring-batches report.
    pub expiry_window_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Per-tenant broadcast buffer.
    pub channel_capacity: usize,
    pub ping_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            loyalty: LoyaltySettings::default(),
            inventory: InventorySettings::default(),
            realtime: RealtimeSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: "./vyapar.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 12 * 60 * 60,
        }
    }
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            points_per_currency_unit: 10,
            strict_redemption: false,
        }
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            expiry_window_days: 7,
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            channel_capacity: vyapar_realtime::DEFAULT_CHANNEL_CAPACITY,
            ping_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Loads defaults, the optional config file and the environment, then
    /// validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("VYAPAR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config: ServerConfig = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("VYAPAR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML document. No environment lookup.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port must not be 0".to_string()));
        }
        if self.realtime.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "realtime.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.realtime.ping_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "realtime.ping_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.loyalty.points_per_currency_unit <= 0 {
            return Err(ConfigError::InvalidValue(
                "loyalty.points_per_currency_unit must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if let Err(e) = vyapar_core::validation::validate_expiry_window(
            self.inventory.expiry_window_days,
        ) {
            return Err(ConfigError::InvalidValue(format!("inventory.{e}")));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("bind_addr '{}'", self.bind_addr)))
    }

    pub fn db_config(&self) -> DbConfig {
        if self.database.path == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
    }

    pub fn loyalty_policy(&self) -> LoyaltyPolicy {
        LoyaltyPolicy {
            paise_per_point: self.loyalty.points_per_currency_unit * 100,
            strict_redemption: self.loyalty.strict_redemption,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_secs(self.realtime.ping_interval_secs),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),

    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
}
