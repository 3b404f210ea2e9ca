//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::registry::Retention;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent`, `namespace_prefix` or `version` is empty
    /// - a route does not start with `/`
    /// - there is not exactly one persistent-config namespace
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.namespace_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "namespace_prefix".into(), reason: "must not be empty".into() });
        }
        if self.manifest_path.is_none() && self.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }

        if let Some(route) = self.routes.iter().find(|r| !r.starts_with('/')) {
            return Err(ConfigError::Invalid { field: "routes".into(), reason: format!("{route} must start with /") });
        }

        let config_namespaces = self
            .persistent_namespaces
            .iter()
            .filter(|ns| ns.retention == Retention::PersistentConfig)
            .count();
        if config_namespaces != 1 {
            return Err(ConfigError::Invalid {
                field: "persistent_namespaces".into(),
                reason: format!("expected exactly one persistent-config namespace, found {config_namespaces}"),
            });
        }

        if let Some(route) = self.routes.iter().find(|r| self.excluded_paths.iter().any(|ex| r.contains(ex.as_str()))) {
            tracing::warn!(route = %route, "route matches an excluded path and will never be cached");
        }

        Ok(())
    }
}
