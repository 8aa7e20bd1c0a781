use crate::cli::{Cli, VerbosityLevel};
use crate::policy::{AccessList, PolicyError, SecurityPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

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

    #[error("Access policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub security: SecurityPolicy,
    pub output: OutputConfig,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (errors only)
    pub quiet: bool,
}

impl Config {
    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "validate-xsd.toml",
    "validate-xsd.json",
    ".validate-xsd.toml",
    ".validate-xsd.json",
];

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider)
    }

    pub fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let mut config = Config::default();

        if let Some(config_path) = &cli.config {
            config = Self::load_from_file(config_path)?;
        } else if let Some(found_config) = Self::find_config_file()? {
            config = found_config;
        }

        config = Self::apply_environment_overrides_with(env, config)?;
        config = Self::merge_with_cli(config, cli)?;

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Result<Option<Config>> {
        Self::find_config_file_in(Path::new("."), dirs::config_dir().as_deref())
    }

    pub fn find_config_file_in(
        current_dir: &Path,
        user_config_dir: Option<&Path>,
    ) -> Result<Option<Config>> {
        let mut candidates: Vec<PathBuf> =
            CONFIG_NAMES.iter().map(|name| current_dir.join(name)).collect();

        if let Some(config_dir) = user_config_dir {
            let app_config_dir = config_dir.join("validate-xsd");
            candidates.extend(CONFIG_NAMES.iter().map(|name| app_config_dir.join(name)));
        }

        for path in candidates {
            if path.is_file() {
                tracing::debug!(config = %path.display(), "loading configuration file");
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(value) = env.get("VALIDATE_XSD_SECURE_PROCESSING") {
            config.security.secure_processing = parse_bool("VALIDATE_XSD_SECURE_PROCESSING", &value)?;
        }

        if let Some(value) = env.get("VALIDATE_XSD_ALLOW_EXTERNAL_DTD") {
            config.security.access.external_dtd = value.parse().map_err(|e: PolicyError| {
                ConfigError::Environment(format!("Invalid VALIDATE_XSD_ALLOW_EXTERNAL_DTD value: {}", e))
            })?;
        }

        if let Some(value) = env.get("VALIDATE_XSD_ALLOW_EXTERNAL_SCHEMA") {
            config.security.access.external_schema = value.parse().map_err(|e: PolicyError| {
                ConfigError::Environment(format!(
                    "Invalid VALIDATE_XSD_ALLOW_EXTERNAL_SCHEMA value: {}",
                    e
                ))
            })?;
        }

        if let Some(value) = env.get("VALIDATE_XSD_VERBOSE") {
            config.output.verbose = parse_bool("VALIDATE_XSD_VERBOSE", &value)?;
        }

        if let Some(value) = env.get("VALIDATE_XSD_QUIET") {
            config.output.quiet = parse_bool("VALIDATE_XSD_QUIET", &value)?;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Result<Config> {
        if cli.no_secure_processing {
            config.security.secure_processing = false;
        }
        if !cli.allow_external_dtd.is_empty() {
            config.security.access.external_dtd = AccessList::from_entries(&cli.allow_external_dtd)?;
        }
        if !cli.allow_external_schema.is_empty() {
            config.security.access.external_schema =
                AccessList::from_entries(&cli.allow_external_schema)?;
        }

        // A verbosity flag on the command line replaces the configured one
        if cli.verbose || cli.quiet {
            config.output.verbose = cli.verbose;
            config.output.quiet = cli.quiet;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Environment(format!(
            "Invalid {} value: {}",
            key, value
        ))),
    }
}
