//! Application state and composition root.
//!
//! Reads the settings, installs the logger, connects the document store and
//! hands out repositories and authentication guards built from them.

use std::sync::Arc;

use crate::api::middleware::AuthGuard;
use crate::config::validation::RECOMMENDED_SECRET_LENGTH;
use crate::config::{ConfigLoader, SecurityConfig, Settings};
use crate::error::AppResult;
use crate::logger::init_logger;
use crate::repositories::GenericRepository;
use crate::store::{MongoStore, StoreHandle};
use crate::utils::jwt::AuthToken;

/// Shared state: one store handle and the immutable settings.
///
/// Cloning is cheap since both fields are reference counted. It can be used
/// directly with axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    store: StoreHandle,
    settings: Arc<Settings>,
}

impl AppState {
    /// Builds the state from the environment.
    ///
    /// Loads `settings.<env>.json`, installs the global logger and connects
    /// to MongoDB. Call once per process.
    ///
    /// # Errors
    /// Fails on configuration or logger errors, or when the store client
    /// cannot be created.
    pub async fn bootstrap() -> AppResult<Self> {
        let loader = ConfigLoader::new()?;
        let settings = loader.load()?;

        init_logger(settings.logger.clone().into_logger_config()?)?;
        warn_if_weak_secret(&settings.security);

        let store = MongoStore::connect(&settings.database_config()).await?;

        tracing::info!(
            application = %settings.application.name,
            environment = %loader.env_name(),
            database = %settings.database.name,
            token_expiration = settings.security.token_expiration,
            "Application state initialized"
        );

        Ok(Self::with_store(settings, StoreHandle::new(store)))
    }

    /// Builds the state around an already constructed store.
    pub fn with_store(settings: Settings, store: StoreHandle) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Repository bound to `collection`.
    pub fn repository(&self, collection: &str) -> GenericRepository {
        GenericRepository::new(self.store.clone(), collection)
    }

    /// Middleware state signed with the configured secret, optionally
    /// requiring `role`.
    pub fn auth_guard(&self, role: Option<&str>) -> AuthGuard {
        let guard = AuthGuard::new(self.settings.security.secret.as_str());
        match role {
            Some(role) => guard.with_role(role),
            None => guard,
        }
    }

    /// Signs `token` with the configured secret and lifetime.
    pub fn issue_token(&self, token: &AuthToken) -> AppResult<String> {
        token.encode(
            &self.settings.security.secret,
            self.settings.security.token_expiration,
        )
    }
}

/// Short secrets are accepted at load time. The warning is emitted here,
/// once a subscriber is installed.
fn warn_if_weak_secret(security: &SecurityConfig) {
    if security.is_weak_secret() {
        tracing::warn!(
            length = security.secret.len(),
            recommended = RECOMMENDED_SECRET_LENGTH,
            "Token secret is shorter than recommended"
        );
    }
}
