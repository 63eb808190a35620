//! Configuration loader
//!
//! Reads `settings.<env>.json` (or one explicit file) and applies `ORI_*`
//! environment variable overrides on top.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Environment variable for the configuration directory
const CONFIG_DIR_ENV: &str = "ORI_CONFIG_DIR";

/// Environment variable for one explicit configuration file
const CONFIG_FILE_ENV: &str = "ORI_CONFIG_FILE";

const DEFAULT_CONFIG_DIR: &str = ".";

/// Prefix for configuration overrides, e.g. `ORI_DATABASE__URL`
const ENV_PREFIX: &str = "ORI";

/// Separator for nested keys in environment variables
const ENV_SEPARATOR: &str = "__";

/// Loads [`Settings`] once at start-up.
///
/// Sources, lowest priority first:
/// 1. `<ORI_CONFIG_DIR>/settings.<ORI_ENV>.json`, or the file named by `ORI_CONFIG_FILE`
/// 2. `ORI_*` environment variables
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
    env_name: String,
}

impl ConfigLoader {
    /// Create a loader from `ORI_CONFIG_DIR`, `ORI_CONFIG_FILE` and `ORI_ENV`.
    ///
    /// # Errors
    ///
    /// Returns an error if both `ORI_CONFIG_DIR` and `ORI_CONFIG_FILE` are set,
    /// or if `ORI_ENV` holds an invalid name.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_dir.is_some() && config_file.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "ORI_CONFIG_DIR and ORI_CONFIG_FILE cannot both be set. \
                 Use ORI_CONFIG_DIR to pick settings.<env>.json from a directory or \
                 ORI_CONFIG_FILE for a single configuration file.",
            ));
        }

        Ok(Self {
            config_dir: config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            env_name: AppEnvironment::name_from_env()?,
        })
    }

    /// Loader reading `settings.<env_name>.json` from `config_dir`,
    /// ignoring the location variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `env_name` is not a valid environment name.
    pub fn from_dir(
        config_dir: impl Into<PathBuf>,
        env_name: impl AsRef<str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            config_dir: config_dir.into(),
            config_file: None,
            env_name: AppEnvironment::check_name(env_name.as_ref())?,
        })
    }

    /// Environment name as given, e.g. `prod` or `qa`.
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Well-known environment the name refers to, if any.
    pub fn environment(&self) -> Option<AppEnvironment> {
        self.env_name.parse().ok()
    }

    /// Path of the settings file this loader reads.
    pub fn settings_path(&self) -> PathBuf {
        match &self.config_file {
            Some(file) => file.clone(),
            None => self
                .config_dir
                .join(format!("settings.{}.json", self.env_name)),
        }
    }

    /// Load and validate the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file is missing, cannot be parsed, or
    /// fails validation.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let config = self.build_config()?;
        let settings: Settings = config.try_deserialize().map_err(|e| {
            ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e))
        })?;

        settings.validate()?;

        Ok(settings)
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let path = self.settings_path();
        let builder = Self::add_file_source(Config::builder(), &path)?;

        // ORI_DATABASE__URL -> database.url
        let builder = Self::add_env_source(builder);

        builder.build().map_err(ConfigError::from)
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::file_not_found(path.display().to_string()));
        }
        let Some(name) = path.to_str() else {
            return Err(ConfigError::ParseError(format!(
                "Configuration path is not valid UTF-8: {}",
                path.display()
            )));
        };
        Ok(builder.add_source(File::new(name, FileFormat::Json).required(true)))
    }

    fn add_env_source(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .ignore_empty(true)
                .try_parsing(true),
        )
    }
}
