use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::exchange::METALS_API_URL;
use crate::ml::{Arima110, Forecaster};
use crate::types::{default_instruments, is_valid_instrument, quote_currency};

/// Prefix of environment overrides, e.g. `METALS__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "METALS";

/// Plain environment variable holding the Metals API key
pub const API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub instruments: Vec<String>,
    /// Length of generated training series
    pub x_size: usize,
    /// Length of generated hold-out series
    pub y_size: usize,
    pub model_dir: String,
    pub database_url: String,
    /// Hours of stored quotes used for training, 0 for all of them
    pub history_window_hours: u32,
    pub metals_api: MetalsApiSettings,
    pub server: ServerSettings,
    pub backup: BackupSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            x_size: 12,
            y_size: 1,
            model_dir: "model1".to_string(),
            database_url: "sqlite:./metals.db".to_string(),
            history_window_hours: 12,
            metals_api: MetalsApiSettings::default(),
            server: ServerSettings::default(),
            backup: BackupSettings::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file at `path` if it exists, then `METALS__*` env vars
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("instruments")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;
        if config.metals_api.api_key.is_none() {
            config.metals_api.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        debug!("Loaded configuration from {} and environment", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.instruments.is_empty() {
            errors.push("instruments must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !is_valid_instrument(instrument) {
                errors.push(format!("invalid instrument name: {}", instrument));
                continue;
            }
            if !seen.insert(instrument.as_str()) {
                errors.push(format!("duplicate instrument: {}", instrument));
            }
            let currency = quote_currency(instrument).unwrap_or_default();
            if !currency.eq_ignore_ascii_case(&self.metals_api.base_currency) {
                errors.push(format!(
                    "{} is not quoted in base currency {}",
                    instrument, self.metals_api.base_currency
                ));
            }
        }

        let min_len = Arima110.min_series_len();
        if self.x_size < min_len {
            errors.push(format!("x_size must be >= {}", min_len));
        }
        if self.y_size == 0 {
            errors.push("y_size must be > 0".to_string());
        }
        if self.model_dir.trim().is_empty() {
            errors.push("model_dir must not be empty".to_string());
        }
        if self.database_url.trim().is_empty() {
            errors.push("database_url must not be empty".to_string());
        }
        if self.server.port == 0 {
            errors.push("server.port must be > 0".to_string());
        }
        if self.backup.max_backups == 0 {
            errors.push("backup.max_backups must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(&self.model_dir)
    }

    pub fn backup_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup.dir)
    }

    /// Effective configuration as TOML, with the API key masked
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let mut shown = self.clone();
        if shown.metals_api.api_key.is_some() {
            shown.metals_api.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalsApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub base_currency: String,
}

impl Default for MetalsApiSettings {
    fn default() -> Self {
        Self {
            base_url: METALS_API_URL.to_string(),
            api_key: None,
            base_currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub dir: String,
    pub max_backups: usize,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dir: "backups".to_string(),
            max_backups: 20,
        }
    }
}
