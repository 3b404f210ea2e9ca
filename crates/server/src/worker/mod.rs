//! The offline-caching worker.
//!
//! Everything here shares one [`WorkerContext`]: the namespace registry, the
//! store, consent (persisted and in-memory), the notification bus and the
//! network fetcher. Components, leaves first:
//!
//! - [`precache`]: bulk asset batch, then progressive routes with progress events
//! - [`navigation`]: offline answer for document loads
//! - [`intercept`]: per-request routing on the consent flag
//! - [`control`]: inbound control messages
//! - [`lifecycle`]: install/activate, stale-version cleanup
//! - [`dispatch`]: the single event queue driving lifecycle and control

pub mod control;
pub mod dispatch;
pub mod intercept;
pub mod lifecycle;
pub mod navigation;
pub mod precache;

use std::sync::Arc;

use lantern_client::Fetcher;
use lantern_core::{CacheDb, CacheRegistry, ConsentState, ConsentStore, Error, Manifest, NotificationBus, StoredResponse};
use serde::Serialize;
use tokio::sync::watch;
use url::Url;

/// Where the worker is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Installed,
    Activating,
    /// Clients are claimed; the interceptor is consent-aware.
    Activated,
}

/// State shared by every worker component.
pub struct WorkerContext {
    pub registry: CacheRegistry,
    pub db: CacheDb,
    pub consent_store: ConsentStore,
    pub consent: ConsentState,
    pub bus: NotificationBus,
    pub fetcher: Arc<dyn Fetcher>,
    pub origin: Url,
    pub manifest: Manifest,
    pub routes: Vec<String>,
    phase: watch::Sender<Phase>,
}

impl WorkerContext {
    pub fn new(
        registry: CacheRegistry, db: CacheDb, fetcher: Arc<dyn Fetcher>, origin: Url, manifest: Manifest,
        routes: Vec<String>,
    ) -> Self {
        let consent_store = ConsentStore::new(db.clone(), registry.persistent_config());
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            registry,
            db,
            consent_store,
            consent: ConsentState::new(),
            bus: NotificationBus::default(),
            fetcher,
            origin,
            manifest,
            routes,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        tracing::debug!(?previous, current = ?phase, "worker phase changed");
    }

    /// Write one entry, refusing excluded paths.
    pub async fn store(&self, namespace: &str, url: &Url, response: &StoredResponse) -> Result<(), Error> {
        if self.registry.is_excluded(url.path()) {
            return Err(Error::Excluded(url.path().to_string()));
        }
        self.db.put_entry(namespace, url.as_str(), response).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted network and context builders for worker tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use lantern_client::{FetchRequest, FetchResponse};
    use lantern_client::StatusCode;
    use lantern_client::header::HeaderMap;
    use lantern_core::{Namespace, Retention};
    use tokio::sync::Notify;

    use super::*;

    pub const ORIGIN: &str = "https://dict.example.org";

    /// In-memory origin: known URLs answer 200, unknown ones 404.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        pages: Mutex<HashMap<String, (u16, String)>>,
        failing: Mutex<HashSet<String>>,
        offline: AtomicBool,
        calls: AtomicUsize,
        log: Mutex<Vec<String>>,
        held: Mutex<HashMap<String, Arc<Notify>>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn page(&self, path: &str, body: &str) {
            self.respond(path, 200, body);
        }

        pub fn respond(&self, path: &str, status: u16, body: &str) {
            self.pages
                .lock()
                .unwrap()
                .insert(url(path).to_string(), (status, body.to_string()));
        }

        /// Make one URL fail at the transport level.
        pub fn fail(&self, path: &str) {
            self.failing.lock().unwrap().insert(url(path).to_string());
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Park the next fetch of `path` until the returned gate is notified.
        pub fn hold(&self, path: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.held.lock().unwrap().insert(url(path).to_string(), gate.clone());
            gate
        }

        /// Yield until `path` has been requested at least once.
        pub async fn wait_for(&self, path: &str) {
            let wanted = url(path).to_string();
            while !self.log.lock().unwrap().contains(&wanted) {
                tokio::task::yield_now().await;
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requested(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = request.url.to_string();
            self.log.lock().unwrap().push(key.clone());

            let gate = self.held.lock().unwrap().remove(&key);
            if let Some(gate) = gate {
                gate.notified().await;
            }

            if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&key) {
                return Err(Error::Network(format!("unreachable: {key}")));
            }

            let (status, body) = self
                .pages
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or((404, "not found".to_string()));

            let mut headers = HeaderMap::new();
            headers.insert("content-type", "text/html".parse().unwrap());
            Ok(FetchResponse {
                url: request.url,
                status: StatusCode::from_u16(status).unwrap(),
                headers,
                bytes: Bytes::from(body),
                fetch_ms: 0,
            })
        }
    }

    pub fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    pub fn key(path: &str) -> String {
        url(path).to_string()
    }

    pub fn registry(version: &str) -> CacheRegistry {
        CacheRegistry::new(
            "lantern",
            version,
            vec![
                Namespace::persistent("config", "lantern-config", Retention::PersistentConfig),
                Namespace::persistent("morphology", "lantern-morphology-data", Retention::PersistentData),
            ],
            vec!["/sw.js".into(), "/sw-settings.json".into()],
        )
        .unwrap()
    }

    /// Context for `version` over `db`, with the given assets and routes.
    pub fn context(
        db: CacheDb, fetcher: Arc<ScriptedFetcher>, version: &str, assets: &[&str], routes: &[&str],
    ) -> Arc<WorkerContext> {
        let manifest = Manifest::new(version, assets.iter().map(|a| a.to_string()).collect());
        Arc::new(WorkerContext::new(
            registry(version),
            db,
            fetcher,
            Url::parse(ORIGIN).unwrap(),
            manifest,
            routes.iter().map(|r| r.to_string()).collect(),
        ))
    }

    /// A fetcher serving the root, the given assets and the given routes.
    pub fn site(assets: &[&str], routes: &[&str]) -> Arc<ScriptedFetcher> {
        let fetcher = ScriptedFetcher::new();
        fetcher.page("/", "<html>home</html>");
        for path in assets.iter().chain(routes) {
            fetcher.page(path, &format!("content of {path}"));
        }
        fetcher
    }
}
