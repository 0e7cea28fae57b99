use crate::error::{Result, TablecraftError};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, error, info, trace, warn};

pub const CONFIG_FILE_NAME: &str = "tablecraft.toml";
pub const CONFIG_PATH_VAR: &str = "TABLECRAFT_CONFIG";

/// Base URLs of the three backend services
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub auth_url: String,
    pub core_url: String,
    pub generation_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the backend signals an expired or invalid bearer token
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Matched against `detail` / `message` in the error payload
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
    /// Matched against `code` / `error_code` in the error payload
    #[serde(default = "default_failure_code")]
    pub failure_code: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            failure_message: default_failure_message(),
            failure_code: default_failure_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// File holding persisted client state (the bearer token)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".tablecraft/storage.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_export_type")]
    pub export_type: String,
    #[serde(default = "default_total_records")]
    pub default_total_records: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            export_type: default_export_type(),
            default_total_records: default_total_records(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_history_interval_secs")]
    pub history_interval_secs: u64,
}

impl PollingConfig {
    pub fn history_interval(&self) -> Duration {
        Duration::from_secs(self.history_interval_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            history_interval_secs: default_history_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Root configuration, read from tablecraft.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TablecraftConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}
fn default_failure_message() -> String {
    "Could not validate credentials".to_string()
}
fn default_failure_code() -> String {
    "token_expired".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_export_type() -> String {
    "csv".to_string()
}
fn default_total_records() -> u32 {
    50
}
fn default_history_interval_secs() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}

impl TablecraftConfig {
    /// Load configuration from `$TABLECRAFT_CONFIG` or ./tablecraft.toml
    pub fn new() -> Result<TablecraftConfig> {
        info!("Loading Tablecraft configuration");
        dotenv::dotenv().ok();
        debug!("Environment variables loaded from .env");

        let config_path = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                debug!("{} not set, using ./{}", CONFIG_PATH_VAR, CONFIG_FILE_NAME);
                PathBuf::from(CONFIG_FILE_NAME)
            }
        };

        Self::from_path(&config_path)
    }

    pub fn from_path(config_path: &Path) -> Result<TablecraftConfig> {
        debug!("Looking for config file at: {:?}", config_path);

        if !config_path.exists() {
            error!("Configuration file not found at: {:?}", config_path);
            return Err(TablecraftError::config(format!(
                "{} not found. Configuration file is required.",
                config_path.display()
            )));
        }

        let contents = fs::read_to_string(config_path).map_err(|e| {
            error!("Failed to read configuration file: {}", e);
            e
        })?;
        debug!("Configuration file size: {} bytes", contents.len());

        let config = Self::from_toml_str(&contents)?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<TablecraftConfig> {
        let mut config: TablecraftConfig = toml::from_str(contents).map_err(|e| {
            error!("Failed to parse TOML configuration: {}", e);
            e
        })?;
        debug!("Successfully parsed TOML configuration");

        config.api.auth_url = Self::substitute_env_vars(&config.api.auth_url)?;
        config.api.core_url = Self::substitute_env_vars(&config.api.core_url)?;
        config.api.generation_url = Self::substitute_env_vars(&config.api.generation_url)?;
        let storage_path = config.storage.path.to_string_lossy().into_owned();
        config.storage.path = PathBuf::from(Self::substitute_env_vars(&storage_path)?);

        config.validate()?;
        debug!(
            "Services: auth={}, core={}, generation={}",
            config.api.auth_url, config.api.core_url, config.api.generation_url
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for url in [
            &self.api.auth_url,
            &self.api.core_url,
            &self.api.generation_url,
        ] {
            reqwest::Url::parse(url).map_err(|e| TablecraftError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        }
        if self.polling.history_interval_secs == 0 {
            return Err(TablecraftError::config(
                "polling.history_interval_secs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Substitute environment variables in config strings
    /// Supports ${VAR_NAME} and ${VAR_NAME:-default}
    fn substitute_env_vars(value: &str) -> Result<String> {
        trace!("Substituting environment variables in: {}", value);
        let mut result = value.to_string();

        let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
            .map_err(|e| TablecraftError::config(e.to_string()))?;

        for cap in re.captures_iter(value) {
            let var_name = &cap[1];
            let default_value = cap.get(2).map(|m| m.as_str());

            let replacement = match (env::var(var_name), default_value) {
                (Ok(v), _) => v,
                (Err(_), Some(default)) => {
                    warn!(
                        "Environment variable {} not set, using default: {}",
                        var_name, default
                    );
                    default.to_string()
                }
                (Err(_), None) => {
                    error!(
                        "Environment variable {} not set and no default provided",
                        var_name
                    );
                    return Err(TablecraftError::EnvVarNotSet(var_name.to_string()));
                }
            };

            let full_match = &cap[0];
            debug!("Replacing {} with value from {}", full_match, var_name);
            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }
}
