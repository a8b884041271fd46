use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::domain::order::DeletePolicy;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Sources, later ones winning:
// 1. config/shop_admin.toml (optional)
// 2. SHOP_ADMIN__* environment variables, e.g. SHOP_ADMIN__METRICS_PORT=9191
//
// ============================================================================

pub const CONFIG_FILE: &str = "config/shop_admin.toml";
const ENV_PREFIX: &str = "SHOP_ADMIN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Postgres URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Attempts made to reach the database at startup
    pub connect_retries: u32,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub orders_per_page: usize,
    pub products_per_page: usize,
    pub low_stock_threshold: i64,
    /// Fallback when RUST_LOG is unset
    pub log_filter: String,
    /// Where "remember me" keeps the admin session; in memory when absent
    pub session_file: Option<PathBuf>,
    pub order_delete_policy: DeletePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            connect_retries: 5,
            metrics_enabled: true,
            metrics_port: 9090,
            orders_per_page: 10,
            products_per_page: 10,
            low_stock_threshold: 10,
            log_filter: "info,shop_admin=debug".to_string(),
            session_file: None,
            order_delete_policy: DeletePolicy::WriteOff,
        }
    }
}

/// Outcome of `AppConfig::load`. A config file that could not be read is
/// kept here so it can be reported once logging is running.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub file_error: Option<ConfigError>,
}

impl LoadedConfig {
    pub fn report(&self) {
        if let Some(err) = &self.file_error {
            tracing::warn!(error = %err, file = CONFIG_FILE, "Config file unreadable, using environment only");
        }
    }
}

impl AppConfig {
    /// Load from the config file (if present) and the environment
    pub fn load() -> Result<LoadedConfig, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let (settings, file_error) = match Self::builder(Some(path)).build() {
            Ok(settings) => (settings, None),
            Err(err) => (Self::builder(None).build()?, Some(err)),
        };
        Ok(LoadedConfig {
            config: settings.try_deserialize()?,
            file_error,
        })
    }

    /// Parse a TOML document, then apply environment overrides
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    fn builder(file: Option<&Path>) -> config::ConfigBuilder<config::builder::DefaultState> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder.add_source(environment())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}
