//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LANTERN_*)
//! 2. TOML config file (if LANTERN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;
use crate::registry::{CacheRegistry, Namespace, Retention};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LANTERN_*)
/// 2. TOML config file (if LANTERN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream origin the proxy fronts, e.g. `https://app.example.com`.
    ///
    /// Set via LANTERN_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Socket address the proxy listens on.
    ///
    /// Set via LANTERN_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via LANTERN_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix shared by every namespace identifier.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Build version, used when no manifest file is configured.
    #[serde(default = "default_version")]
    pub version: String,

    /// Build-time manifest (`{version, assets}`); overrides `version` and `assets`.
    ///
    /// Set via LANTERN_MANIFEST_PATH environment variable.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Static asset paths, used when no manifest file is configured.
    #[serde(default)]
    pub assets: Vec<String>,

    /// Must-cache route paths, fetched one at a time after the assets.
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,

    /// Paths that are never cached (matched by substring).
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// Namespaces that survive deployments.
    #[serde(default = "default_persistent_namespaces")]
    pub persistent_namespaces: Vec<Namespace>,

    /// User-Agent string for upstream requests.
    ///
    /// Set via LANTERN_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via LANTERN_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow upstream.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Maximum request body accepted from clients for pass-through requests.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_origin() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./lantern-cache.sqlite")
}

fn default_namespace_prefix() -> String {
    "lantern".into()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_routes() -> Vec<String> {
    vec!["/about".into()]
}

fn default_excluded_paths() -> Vec<String> {
    vec!["/sw.js".into(), "/sw-settings.json".into()]
}

fn default_persistent_namespaces() -> Vec<Namespace> {
    vec![
        Namespace::persistent("config", "lantern-config", Retention::PersistentConfig),
        Namespace::persistent("morphology", "lantern-morphology-data", Retention::PersistentData),
    ]
}

fn default_user_agent() -> String {
    "lantern/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            namespace_prefix: default_namespace_prefix(),
            version: default_version(),
            manifest_path: None,
            assets: Vec::new(),
            routes: default_routes(),
            excluded_paths: default_excluded_paths(),
            persistent_namespaces: default_persistent_namespaces(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LANTERN_`
    /// 2. TOML file from `LANTERN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LANTERN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LANTERN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The manifest for this deployment: the manifest file if configured,
    /// otherwise `version` and `assets` from this config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the manifest file cannot be loaded.
    pub fn manifest(&self) -> Result<Manifest, ConfigError> {
        match &self.manifest_path {
            Some(path) => Manifest::load(path),
            None => Ok(Manifest::new(self.version.clone(), self.assets.clone())),
        }
    }

    /// Build the namespace registry for the given build version.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the namespaces are inconsistent.
    pub fn registry(&self, version: &str) -> Result<CacheRegistry, ConfigError> {
        CacheRegistry::new(
            &self.namespace_prefix,
            version,
            self.persistent_namespaces.clone(),
            self.excluded_paths.clone(),
        )
        .map_err(|e| ConfigError::Invalid { field: "persistent_namespaces".into(), reason: e.to_string() })
    }
}
