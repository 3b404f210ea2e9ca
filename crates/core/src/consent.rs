//! The user's enable/disable decision.
//!
//! [`ConsentStore`] persists the decision as a small JSON record inside the
//! persistent-config namespace. [`ConsentState`] is the process-wide
//! in-memory copy read by request handling. The in-memory flag is advisory:
//! across restarts the stored record is authoritative.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::store::{CacheDb, StoredResponse};

/// Key of the consent record inside the persistent-config namespace.
pub const CONSENT_KEY: &str = "consent";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ConsentRecord {
    enabled: bool,
}

/// Reads and writes the persisted consent record.
///
/// Neither operation fails: storage errors are logged and the safe
/// "no caching" default is assumed.
#[derive(Debug, Clone)]
pub struct ConsentStore {
    db: CacheDb,
    namespace: String,
}

impl ConsentStore {
    pub fn new(db: CacheDb, namespace: impl Into<String>) -> Self {
        Self { db, namespace: namespace.into() }
    }

    /// Stored decision, or `false` if absent or unreadable.
    pub async fn read(&self) -> bool {
        match self.db.get_entry(&self.namespace, CONSENT_KEY).await {
            Ok(Some(entry)) => match serde_json::from_slice::<ConsentRecord>(&entry.body) {
                Ok(record) => record.enabled,
                Err(e) => {
                    tracing::warn!(namespace = %self.namespace, error = %e, "unreadable consent record");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, error = %e, "failed to read consent");
                false
            }
        }
    }

    /// Persist the decision; failures are logged and swallowed.
    pub async fn write(&self, enabled: bool) {
        let body = match serde_json::to_vec(&ConsentRecord { enabled }) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode consent");
                return;
            }
        };
        let entry = StoredResponse::new(200, body).with_header("content-type", "application/json");

        if let Err(e) = self.db.put_entry(&self.namespace, CONSENT_KEY, &entry).await {
            tracing::warn!(namespace = %self.namespace, enabled, error = %e, "failed to persist consent");
        }
    }
}

/// In-memory consent flag plus a generation counter.
///
/// Every [`set`](Self::set) starts a new generation. Long-running work that
/// was started under an older generation can detect it has been overtaken.
#[derive(Debug, Default)]
pub struct ConsentState {
    enabled: AtomicBool,
    generation: AtomicU64,
}

impl ConsentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Update the flag and return the token of the new generation.
    pub fn set(&self, enabled: bool) -> u64 {
        self.enabled.store(enabled, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether `token` still names the latest generation.
    pub fn is_current(&self, token: u64) -> bool {
        self.generation() == token
    }
}
