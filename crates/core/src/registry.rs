//! The fixed set of cache namespaces and their retention semantics.
//!
//! Exactly one versioned-core namespace is current: its identifier embeds the
//! build version. Any other identifier that carries the versioned-core prefix
//! belongs to an earlier deployment and is stale. Persistent namespaces keep
//! their identifiers across versions.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Logical name of the versioned-core namespace.
pub const CORE: &str = "core";

/// How long a namespace lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Retention {
    VersionedCore,
    PersistentConfig,
    PersistentData,
}

/// A registered namespace: logical name, storage identifier, retention class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub identifier: String,
    pub retention: Retention,
}

impl Namespace {
    pub fn persistent(name: &str, identifier: &str, retention: Retention) -> Self {
        Self { name: name.into(), identifier: identifier.into(), retention }
    }
}

/// Pure lookup over the registered namespaces and the excluded-paths set.
#[derive(Debug, Clone)]
pub struct CacheRegistry {
    core_prefix: String,
    namespaces: Vec<Namespace>,
    excluded: Vec<String>,
}

impl CacheRegistry {
    /// Build the registry for one deployment.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the prefix or version is empty, if
    /// there is not exactly one persistent-config namespace, if a persistent
    /// namespace claims a non-persistent retention class, or if a persistent
    /// identifier collides with the versioned-core pattern.
    pub fn new(prefix: &str, version: &str, persistent: Vec<Namespace>, excluded: Vec<String>) -> Result<Self, Error> {
        if prefix.is_empty() {
            return Err(Error::InvalidInput("namespace prefix must not be empty".into()));
        }
        if version.is_empty() {
            return Err(Error::InvalidInput("build version must not be empty".into()));
        }

        let core_prefix = format!("{prefix}-core-");
        let config_count = persistent
            .iter()
            .filter(|ns| ns.retention == Retention::PersistentConfig)
            .count();
        if config_count != 1 {
            return Err(Error::InvalidInput(format!(
                "expected exactly one persistent-config namespace, found {config_count}"
            )));
        }

        for ns in &persistent {
            if ns.retention == Retention::VersionedCore {
                return Err(Error::InvalidInput(format!("{} cannot be versioned-core", ns.identifier)));
            }
            if ns.identifier.starts_with(&core_prefix) || ns.name == CORE {
                return Err(Error::InvalidInput(format!(
                    "{} collides with the versioned-core namespace",
                    ns.identifier
                )));
            }
        }

        let mut namespaces = Vec::with_capacity(persistent.len() + 1);
        namespaces.push(Namespace {
            name: CORE.into(),
            identifier: format!("{core_prefix}{version}"),
            retention: Retention::VersionedCore,
        });
        namespaces.extend(persistent);

        Ok(Self { core_prefix, namespaces, excluded })
    }

    /// Identifier registered under a logical name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.name == name)
            .map(|ns| ns.identifier.as_str())
    }

    /// Resolve a logical name, or treat the argument as a literal identifier.
    pub fn resolve_or_literal<'a>(&'a self, name: &'a str) -> &'a str {
        self.resolve(name).unwrap_or(name)
    }

    /// Every registered identifier in lookup order, versioned-core first.
    pub fn all_identifiers(&self) -> Vec<&str> {
        self.namespaces.iter().map(|ns| ns.identifier.as_str()).collect()
    }

    pub fn versioned_core(&self) -> &str {
        &self.namespaces[0].identifier
    }

    pub fn persistent_config(&self) -> &str {
        self.namespaces
            .iter()
            .find(|ns| ns.retention == Retention::PersistentConfig)
            .map(|ns| ns.identifier.as_str())
            .unwrap_or_default()
    }

    /// True iff `path` contains any excluded path.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|ex| path.contains(ex.as_str()))
    }

    /// True for identifiers of earlier versioned-core deployments.
    pub fn is_stale_versioned(&self, identifier: &str) -> bool {
        identifier.starts_with(&self.core_prefix) && identifier != self.versioned_core()
    }
}
