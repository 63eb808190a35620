//! Configuration management
//!
//! Settings come from an environment-selected JSON file with environment
//! variable overrides:
//!
//! 1. `settings.<env>.json`, where `<env>` is taken from `ORI_ENV`
//!    (default `development`), read from `ORI_CONFIG_DIR` (default: the
//!    working directory). `ORI_CONFIG_FILE` names a single file instead.
//! 2. `ORI_*` environment variables, with `__` between nested keys.

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    ApplicationConfig, ConsoleSettings, DatabaseConfig, FileSettings, LoggerSettings,
    SecurityConfig, Settings,
};
