//! Configuration validation logic

use crate::config::error::ConfigError;
use crate::config::settings::{DatabaseConfig, LoggerSettings, SecurityConfig, Settings};

/// Secrets shorter than this are accepted but reported at start-up.
pub const RECOMMENDED_SECRET_LENGTH: usize = 32;

const VALID_URL_SCHEMES: &[&str] = &["mongodb://", "mongodb+srv://"];

impl DatabaseConfig {
    /// # Validation Rules
    /// - URL must not be empty and must use a MongoDB scheme
    /// - Database name must not be empty
    /// - Timeouts must be greater than 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a MongoDB connection string.",
            ));
        }

        if !VALID_URL_SCHEMES.iter().any(|scheme| self.url.starts_with(scheme)) {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected mongodb:// or mongodb+srv://",
            ));
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "database.name",
                "Database name is required.",
            ));
        }

        if self.connect_timeout == 0 {
            return Err(ConfigError::validation(
                "database.connect_timeout",
                "Connect timeout must be greater than 0 seconds.",
            ));
        }

        if self.server_selection_timeout == 0 {
            return Err(ConfigError::validation(
                "database.server_selection_timeout",
                "Server selection timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl SecurityConfig {
    /// # Validation Rules
    /// - Secret must not be empty
    /// - Token expiration must be positive
    ///
    /// A short secret passes; see [`Self::is_weak_secret`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::validation(
                "security.secret",
                "Token secret is required.",
            ));
        }

        if self.token_expiration <= 0 {
            return Err(ConfigError::ValidationError {
                field: "security.token_expiration".to_string(),
                message: format!(
                    "Token expiration must be positive, got {} hours.",
                    self.token_expiration
                ),
            });
        }

        Ok(())
    }

    /// Whether the secret is shorter than [`RECOMMENDED_SECRET_LENGTH`].
    pub fn is_weak_secret(&self) -> bool {
        self.secret.len() < RECOMMENDED_SECRET_LENGTH
    }
}

impl LoggerSettings {
    /// # Validation Rules
    /// - Level must be a valid filter directive
    /// - File path is required when file logging is enabled
    /// - Format must be one of: full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clone().into_logger_config().map(|_| ())
    }
}

impl Settings {
    /// Validate all sections, returning the first error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.security.validate()?;
        self.logger.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.database.url = "mongodb://localhost:27017".to_string();
        settings.security.secret = "a".repeat(RECOMMENDED_SECRET_LENGTH);
        settings
    }

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("Expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_database_url_required() {
        let mut settings = valid_settings();
        settings.database.url = "  ".to_string();
        assert_eq!(field_of(settings.validate().unwrap_err()), "database.url");
    }

    #[test]
    fn test_database_url_scheme() {
        let mut config = valid_settings().database;
        config.url = "postgres://localhost/db".to_string();
        assert_eq!(field_of(config.validate().unwrap_err()), "database.url");

        config.url = "mongodb+srv://cluster.example.net".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_name_required() {
        let mut settings = valid_settings();
        settings.database.name = String::new();
        assert_eq!(field_of(settings.validate().unwrap_err()), "database.name");
    }

    #[test]
    fn test_database_timeouts() {
        let mut config = valid_settings().database;
        config.connect_timeout = 0;
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "database.connect_timeout"
        );
    }

    #[test]
    fn test_secret_required() {
        let mut settings = valid_settings();
        settings.security.secret = String::new();
        assert_eq!(field_of(settings.validate().unwrap_err()), "security.secret");
    }

    #[test]
    fn test_short_secret_is_accepted() {
        let mut settings = valid_settings();
        settings.security.secret = "short".to_string();
        assert!(settings.security.is_weak_secret());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_token_expiration_must_be_positive() {
        for hours in [0, -1] {
            let mut settings = valid_settings();
            settings.security.token_expiration = hours;
            assert_eq!(
                field_of(settings.validate().unwrap_err()),
                "security.token_expiration"
            );
        }
    }

    #[test]
    fn test_logger_format_checked() {
        let mut settings = valid_settings();
        settings.logger.file.format = "xml".to_string();
        assert_eq!(
            field_of(settings.validate().unwrap_err()),
            "logger.file.format"
        );
    }

    #[test]
    fn test_logger_needs_an_output() {
        let mut settings = valid_settings();
        settings.logger.console.enabled = false;
        assert_eq!(field_of(settings.validate().unwrap_err()), "logger");
    }
}
