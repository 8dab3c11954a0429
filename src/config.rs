use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_HOSTNAME: &str = "VALIDATE_API_HOSTNAME";
pub const ENV_PORT: &str = "VALIDATE_API_PORT";
pub const ENV_ACCESS_TOKEN: &str = "VALIDATE_API_ACCESS_TOKEN";
pub const ENV_TIMEOUT: &str = "VALIDATE_API_TIMEOUT";
pub const ENV_MAX_WORKERS: &str = "VALIDATE_API_MAX_WORKERS";

const MAX_WORKERS_LIMIT: usize = 256;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required setting: {field}")]
    MissingField { field: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
}

/// The live service under test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub access_token: Option<String>,
    pub scheme: String,
    /// Path prefix under which the contract's paths are served
    pub base_path: String,
}

/// How the run is driven
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of concurrent workers
    pub max_workers: usize,
    /// Exercise destructive operations too
    pub allow_destructive: bool,
    /// First endpoint id to validate
    pub start_from: usize,
    /// Force sequential mode regardless of worker count
    pub sequential: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format
    pub format: OutputFormatConfig,
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

/// Output format configuration (serializable version of CLI OutputFormat)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatConfig {
    Human,
    Json,
    Summary,
}

impl From<OutputFormat> for OutputFormatConfig {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputFormatConfig::Human,
            OutputFormat::Json => OutputFormatConfig::Json,
            OutputFormat::Summary => OutputFormatConfig::Summary,
        }
    }
}

impl From<OutputFormatConfig> for OutputFormat {
    fn from(format: OutputFormatConfig) -> Self {
        match format {
            OutputFormatConfig::Human => OutputFormat::Human,
            OutputFormatConfig::Json => OutputFormat::Json,
            OutputFormatConfig::Summary => OutputFormat::Summary,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: None,
            access_token: None,
            scheme: "http".to_string(),
            base_path: "/api".to_string(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_workers: 5,
            allow_destructive: false,
            start_from: 1,
            sequential: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatConfig::Human,
            verbose: false,
            quiet: false,
        }
    }
}

/// Fully specified connection details, available once validation passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub hostname: String,
    pub port: u16,
    pub access_token: String,
    pub scheme: String,
    pub base_path: String,
}

impl Config {
    /// Connection details, or the first required setting that is missing
    pub fn target(&self) -> Result<Target> {
        let missing = |field: &str| ConfigError::MissingField {
            field: field.to_string(),
        };

        Ok(Target {
            hostname: self
                .target
                .hostname
                .clone()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| missing("target.hostname"))?,
            port: self.target.port.ok_or_else(|| missing("target.port"))?,
            access_token: self
                .target
                .access_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("target.access_token"))?,
            scheme: self.target.scheme.clone(),
            base_path: self.target.base_path.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_seconds)
    }

    /// Verbosity after file, environment and CLI layers are merged
    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.output.verbose, self.output.quiet)
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    /// Load configuration reading the environment through `env`
    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        // Start with default configuration
        let mut config = Config::default();

        // Load from configuration file if specified
        if let Some(config_path) = &cli.config {
            config = Self::load_from_file(config_path).await?;
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = found_config;
        }

        config = Self::apply_environment_overrides_with(env, config)?;

        // CLI arguments take precedence over everything else
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                let config: Config = toml::from_str(&content)?;
                Ok(config)
            }
            Some("json") => {
                let config: Config = serde_json::from_str(&content)?;
                Ok(config)
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    let config: Config = serde_json::from_str(&content)?;
                    Ok(config)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "validate-api.toml",
            "validate-api.json",
            ".validate-api.toml",
            ".validate-api.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-api");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(hostname) = env.get(ENV_HOSTNAME) {
            config.target.hostname = Some(hostname);
        }

        if let Some(port) = env.get(ENV_PORT) {
            config.target.port = Some(port.trim().parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid port number: {}", port))
            })?);
        }

        if let Some(token) = env.get(ENV_ACCESS_TOKEN) {
            config.target.access_token = Some(token);
        }

        if let Some(timeout) = env.get(ENV_TIMEOUT) {
            config.run.timeout_seconds = timeout.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid {} value: {}", ENV_TIMEOUT, timeout))
            })?;
        }

        if let Some(workers) = env.get(ENV_MAX_WORKERS) {
            config.run.max_workers = workers.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid {} value: {}",
                    ENV_MAX_WORKERS, workers
                ))
            })?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if let Some(base_path) = &cli.base_path {
            config.target.base_path = base_path.clone();
        }

        if let Some(timeout) = cli.timeout {
            config.run.timeout_seconds = timeout;
        }
        if let Some(max_workers) = cli.max_workers {
            config.run.max_workers = max_workers;
        }
        if let Some(start_from) = cli.start_from {
            config.run.start_from = start_from;
        }
        config.run.allow_destructive |= cli.allow_destructive;
        config.run.sequential |= cli.sequential;

        if let Some(format) = cli.output_format {
            config.output.format = format.into();
        }
        config.output.verbose |= cli.verbose;
        config.output.quiet |= cli.quiet;

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        config.target()?;

        if config.run.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.run.max_workers == 0 {
            return Err(ConfigError::Validation(
                "Number of workers must be greater than 0".to_string(),
            ));
        }
        if config.run.max_workers > MAX_WORKERS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "Number of workers cannot exceed {}",
                MAX_WORKERS_LIMIT
            )));
        }

        if config.run.start_from < 1 {
            return Err(ConfigError::Validation(format!(
                "Invalid start-from value: {}. Must be >= 1",
                config.run.start_from
            )));
        }

        if !matches!(config.target.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Unsupported scheme: {}",
                config.target.scheme
            )));
        }

        // Validate output settings
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }
}
