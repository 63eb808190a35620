//! Environment configuration for the application

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

/// Application environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Test environment
    Test,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

impl Environment {
    /// Environment variable selecting the settings file
    pub const ENV_VAR: &'static str = "ORI_ENV";

    /// Name used when `ORI_ENV` is unset or empty
    pub const DEFAULT_NAME: &'static str = "development";

    /// Raw environment name from `ORI_ENV`, used verbatim in
    /// `settings.<env>.json`.
    ///
    /// Unknown names are kept as they are so `ORI_ENV=qa` reads
    /// `settings.qa.json`. Names that could escape the configuration
    /// directory are rejected.
    pub fn name_from_env() -> Result<String, ConfigError> {
        match std::env::var(Self::ENV_VAR) {
            Ok(name) if !name.trim().is_empty() => Self::check_name(name.trim()),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(Self::DEFAULT_NAME.to_string()),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::EnvVarError(format!(
                "{} is not valid unicode",
                Self::ENV_VAR
            ))),
        }
    }

    /// Accepts ASCII letters, digits, `-` and `_`.
    pub fn check_name(name: &str) -> Result<String, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(name.to_string())
        } else {
            Err(ConfigError::EnvVarError(format!(
                "Invalid environment name '{}' in {}",
                name,
                Self::ENV_VAR
            )))
        }
    }

    /// Name used in `settings.<env>.json`
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}


impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::EnvVarError(format!(
                "Invalid environment '{}'. Valid values are: development, test, staging, production",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
