//! Build-time precache manifest.
//!
//! The packaging step emits a JSON file naming the build version and every
//! static asset path, in order:
//!
//! ```json
//! { "version": "2024.06.1", "assets": ["/app.js", "/app.css"] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub assets: Vec<String>,
}

impl Manifest {
    pub fn new(version: impl Into<String>, assets: Vec<String>) -> Self {
        Self { version: version.into(), assets }
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if the file cannot be read or parsed,
    /// and `ConfigError::Invalid` if the version is empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {e}", path.display())))?;
        let manifest: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::LoadFailed(format!("{}: {e}", path.display())))?;

        if manifest.version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "manifest.version".into(), reason: "must not be empty".into() });
        }

        tracing::debug!(path = %path.display(), version = %manifest.version, assets = manifest.assets.len(), "loaded precache manifest");
        Ok(manifest)
    }
}
