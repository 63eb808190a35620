//! Tests for the logger module

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::logger::config::*;
use crate::logger::{LoggerError, init_logger, open_log_file};

#[cfg(test)]
mod config_tests {
    use super::*;

    fn create_test_config() -> LoggerConfig {
        LoggerConfig {
            console: ConsoleConfig {
                enabled: true,
                colored: false,
            },
            file: FileConfig {
                enabled: false,
                path: PathBuf::from("test.log"),
                append: true,
                format: LogFormat::Full,
            },
            level: "info".to_string(),
        }
    }

    #[test]
    fn test_default_config_creation() {
        let config = LoggerConfig::default();
        assert!(config.console.enabled);
        assert!(config.console.colored);
        assert!(!config.file.enabled);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = create_test_config();
        assert!(config.validate().is_ok());

        config.console.enabled = false;
        config.file.enabled = false;
        assert!(matches!(config.validate(), Err(LoggerError::Config { .. })));
    }

    #[test]
    fn test_filter_directives() {
        let mut config = create_test_config();
        config.level = "ori_kit=debug,warn".to_string();
        assert!(config.validate().is_ok());

        config.level = "ori_kit=notalevel".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_file_path_rejected() {
        let result = FileConfig::new(true, PathBuf::new(), true, LogFormat::Json);
        assert!(result.is_err());

        let disabled = FileConfig::new(false, PathBuf::new(), true, LogFormat::Json);
        assert!(disabled.is_ok());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("full".parse::<LogFormat>().unwrap(), LogFormat::Full);
        assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default(), LogFormat::Full);
        assert_eq!(LogFormat::Compact.as_str(), "compact");
    }

    #[test]
    fn test_invalid_config_never_installs_subscriber() {
        let mut config = create_test_config();
        config.console.enabled = false;
        assert!(matches!(init_logger(config), Err(LoggerError::Config { .. })));
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");

        open_log_file(&path, true).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_append_and_truncate_modes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        writeln!(open_log_file(&path, true).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path, true).unwrap(), "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        writeln!(open_log_file(&path, false).unwrap(), "third").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "third\n");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn property_known_levels_are_valid(
            level in prop::sample::select(vec!["trace", "debug", "info", "warn", "error", "TRACE", "Info"])
        ) {
            let config = LoggerConfig {
                level: level.to_string(),
                ..LoggerConfig::default()
            };
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn property_format_round_trips_through_str(
            format in prop::sample::select(vec![LogFormat::Full, LogFormat::Compact, LogFormat::Json])
        ) {
            prop_assert_eq!(format.as_str().parse::<LogFormat>().unwrap(), format);
        }
    }
}
