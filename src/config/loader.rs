//! Configuration Loader
//!
//! Environment-aware loading: `campaign/base.toml`, then
//! `campaign/<environment>.toml`, then `CAMPAIGN__SECTION__KEY` variables.

use super::error::{ConfigResult, ConfigurationError};
use super::CampaignConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_SUBDIRECTORY: &str = "campaign";
const BASE_FILE: &str = "base.toml";
const ENV_PREFIX: &str = "CAMPAIGN";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: CampaignConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Tests use this to avoid touching `CAMPAIGN_ENV`.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            parallel_execution = config.execution.parallel_execution,
            max_concurrent_executions = config.execution.max_concurrent_executions,
            step_timeout_seconds = config.step.timeout_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Pretty JSON of the effective values
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::json!(self.config)
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<CampaignConfig> {
        let campaign_dir = config_directory.join(CONFIG_SUBDIRECTORY);
        let base_path = campaign_dir.join(BASE_FILE);

        if !base_path.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![base_path]));
        }

        let env_path = campaign_dir.join(format!("{environment}.toml"));
        if env_path.is_file() {
            debug!("Applying environment overrides from {}", env_path.display());
        } else {
            debug!(
                "No overrides for environment '{}' at {}",
                environment,
                env_path.display()
            );
        }

        let merged = Config::builder()
            .add_source(File::from(base_path).format(FileFormat::Toml))
            .add_source(
                File::from(env_path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        merged
            .try_deserialize::<CampaignConfig>()
            .map_err(ConfigurationError::deserialization_error)
    }

    /// `CAMPAIGN_ENV`, falling back to `APP_ENV`, then `development`
    pub fn detect_environment() -> String {
        env::var("CAMPAIGN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `CAMPAIGN_CONFIG_DIR`, else the nearest `config/` holding
    /// `campaign/base.toml` walking up from the working directory
    fn default_config_directory() -> PathBuf {
        if let Ok(dir) = env::var("CAMPAIGN_CONFIG_DIR") {
            return PathBuf::from(dir);
        }

        if let Ok(mut current) = env::current_dir() {
            loop {
                let candidate = current.join("config");
                if candidate.join(CONFIG_SUBDIRECTORY).join(BASE_FILE).is_file() {
                    debug!("Found config directory: {}", candidate.display());
                    return candidate;
                }
                if !current.pop() {
                    break;
                }
            }
        }

        PathBuf::from("config")
    }
}
