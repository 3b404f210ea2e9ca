//! Inbound control messages.
//!
//! Unknown kinds are a no-op. No handler reports failure to the sender:
//! errors are logged and the protocol carries no error notification.

use std::sync::Arc;

use lantern_client::resolve;
use lantern_core::{ControlMessage, Error, Notification};

use super::WorkerContext;
use super::precache::Precacher;

#[derive(Clone)]
pub struct ControlChannel {
    ctx: Arc<WorkerContext>,
    precacher: Precacher,
}

impl ControlChannel {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        let precacher = Precacher::new(ctx.clone());
        Self { ctx, precacher }
    }

    pub async fn dispatch(&self, message: ControlMessage) {
        match message {
            ControlMessage::Enable => self.enable().await,
            ControlMessage::CacheUrl { url, namespace } => {
                if let Err(e) = self.cache_url(&url, namespace.as_deref()).await {
                    tracing::warn!(url = %url, error = %e, "on-demand cache failed");
                }
            }
            ControlMessage::DeleteNamespace { namespace } => self.delete_namespace(&namespace).await,
            ControlMessage::Disable => self.disable().await,
            ControlMessage::Unknown => tracing::debug!("ignoring unknown control message"),
        }
    }

    async fn enable(&self) {
        let token = self.ctx.consent.set(true);
        let ctx = self.ctx.clone();
        let persist = tokio::spawn(async move {
            if ctx.consent.is_current(token) {
                ctx.consent_store.write(true).await;
            }
        });

        self.ctx.bus.publish(Notification::CachingStarted);
        match self.precacher.run(token).await {
            Err(e @ Error::Superseded { .. }) => {
                tracing::info!(error = %e, "precache after enable superseded");
            }
            result => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "precache after enable did not complete");
                }
                self.ctx.bus.publish(Notification::CachingComplete {
                    namespace: self.ctx.registry.versioned_core().to_string(),
                });
            }
        }

        if let Err(e) = persist.await {
            tracing::warn!(error = %e, "consent write task failed");
        }
    }

    async fn cache_url(&self, raw: &str, namespace: Option<&str>) -> Result<(), Error> {
        let url = resolve(&self.ctx.origin, raw).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if self.ctx.registry.is_excluded(url.path()) {
            return Err(Error::Excluded(url.path().to_string()));
        }

        let namespace = namespace
            .map(|ns| self.ctx.registry.resolve_or_literal(ns))
            .unwrap_or_else(|| self.ctx.registry.versioned_core());

        let response = self.ctx.fetcher.get(url.clone()).await?;
        if !response.status.is_success() {
            return Err(Error::HttpError(format!("status {}", response.status.as_u16())));
        }

        self.ctx.store(namespace, &url, &response.to_stored()).await?;
        tracing::info!(namespace, url = %url, "cached on demand");
        Ok(())
    }

    async fn delete_namespace(&self, requested: &str) {
        let identifier = self.ctx.registry.resolve_or_literal(requested);
        match self.ctx.db.delete_namespace(identifier).await {
            Ok(existed) => tracing::info!(namespace = identifier, existed, "namespace deleted"),
            Err(e) => tracing::warn!(namespace = identifier, error = %e, "failed to delete namespace"),
        }
        self.ctx.bus.publish(Notification::NamespaceDeleted { namespace: identifier.to_string() });
    }

    /// Disable caching and remove every namespace.
    ///
    /// The disabled record is written before the sweep, so the stored state
    /// reads as disabled whether or not the config namespace survives it.
    async fn disable(&self) {
        self.ctx.consent.set(false);
        self.ctx.consent_store.write(false).await;

        match self.ctx.db.namespace_names().await {
            Ok(names) => {
                for name in names {
                    if let Err(e) = self.ctx.db.delete_namespace(&name).await {
                        tracing::warn!(namespace = %name, error = %e, "failed to delete namespace");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to enumerate namespaces"),
        }

        self.ctx.bus.publish(Notification::CacheCleared);
        tracing::info!("caching disabled and all namespaces cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{context, key, site};
    use lantern_core::{CacheDb, StoredResponse};
    use tokio::sync::broadcast;

    const ASSETS: &[&str] = &["/app.js"];
    const ROUTES: &[&str] = &["/about", "/grammar"];

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn test_enable_persists_and_precaches() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), site(ASSETS, ROUTES), "1", ASSETS, ROUTES);
        let mut events = ctx.bus.subscribe();

        ControlChannel::new(ctx.clone()).dispatch(ControlMessage::Enable).await;

        assert!(ctx.consent.is_enabled());
        assert!(ctx.consent_store.read().await);
        assert!(db.keys("lantern-core-1").await.unwrap().contains(&key("/about")));

        let events = drain(&mut events);
        assert_eq!(events.first(), Some(&Notification::CachingStarted));
        assert_eq!(events.last(), Some(&Notification::CachingComplete { namespace: "lantern-core-1".into() }));
        assert_eq!(events.len(), 2 + ROUTES.len());
    }

    #[tokio::test]
    async fn test_enable_twice_same_keys() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), site(ASSETS, ROUTES), "1", ASSETS, ROUTES);
        let channel = ControlChannel::new(ctx);

        channel.dispatch(ControlMessage::Enable).await;
        let once = db.keys("lantern-core-1").await.unwrap();
        channel.dispatch(ControlMessage::Enable).await;
        let twice = db.keys("lantern-core-1").await.unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_cache_url_defaults_to_versioned_core() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = site(&[], &["/word/talo"]);
        let ctx = context(db.clone(), fetcher.clone(), "1", &[], &[]);
        let mut events = ctx.bus.subscribe();

        ControlChannel::new(ctx)
            .dispatch(ControlMessage::CacheUrl { url: "/word/talo".into(), namespace: None })
            .await;

        assert_eq!(db.keys("lantern-core-1").await.unwrap(), vec![key("/word/talo")]);
        assert_eq!(db.namespace_names().await.unwrap(), vec!["lantern-core-1".to_string()]);
        assert_eq!(fetcher.calls(), 1);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_cache_url_into_named_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = site(&[], &["/api/paradigm/talo"]);
        let ctx = context(db.clone(), fetcher, "1", &[], &[]);

        ControlChannel::new(ctx)
            .dispatch(ControlMessage::CacheUrl {
                url: "https://dict.example.org/api/paradigm/talo".into(),
                namespace: Some("lantern-morphology-data".into()),
            })
            .await;

        assert_eq!(db.keys("lantern-morphology-data").await.unwrap(), vec![key("/api/paradigm/talo")]);
        assert!(!db.has_namespace("lantern-core-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_url_failure_is_swallowed() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = site(&[], &[]);
        fetcher.fail("/word/talo");
        let ctx = context(db.clone(), fetcher, "1", &[], &[]);
        let channel = ControlChannel::new(ctx);

        channel
            .dispatch(ControlMessage::CacheUrl { url: "/word/talo".into(), namespace: None })
            .await;
        channel
            .dispatch(ControlMessage::CacheUrl { url: "/sw.js".into(), namespace: None })
            .await;

        assert!(db.namespace_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_namespace_removes_only_that_one() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), site(&[], &[]), "1", &[], &[]);
        for ns in ["lantern-core-1", "lantern-config", "lantern-morphology-data"] {
            db.put_entry(ns, "k", &StoredResponse::new(200, "v")).await.unwrap();
        }
        let mut events = ctx.bus.subscribe();

        ControlChannel::new(ctx)
            .dispatch(ControlMessage::DeleteNamespace { namespace: "lantern-morphology-data".into() })
            .await;

        assert_eq!(db.namespace_names().await.unwrap().len(), 2);
        assert!(!db.has_namespace("lantern-morphology-data").await.unwrap());
        assert_eq!(
            drain(&mut events),
            vec![Notification::NamespaceDeleted { namespace: "lantern-morphology-data".into() }]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_namespace_still_notifies() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db, site(&[], &[]), "1", &[], &[]);
        let mut events = ctx.bus.subscribe();

        ControlChannel::new(ctx)
            .dispatch(ControlMessage::DeleteNamespace { namespace: "lantern-core-0".into() })
            .await;

        assert_eq!(drain(&mut events), vec![Notification::NamespaceDeleted { namespace: "lantern-core-0".into() }]);
    }

    #[tokio::test]
    async fn test_disable_clears_everything() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), site(ASSETS, ROUTES), "1", ASSETS, ROUTES);
        let channel = ControlChannel::new(ctx.clone());
        channel.dispatch(ControlMessage::Enable).await;
        db.put_entry("lantern-morphology-data", "k", &StoredResponse::new(200, "v"))
            .await
            .unwrap();
        let mut events = ctx.bus.subscribe();

        channel.dispatch(ControlMessage::Disable).await;

        assert!(!ctx.consent.is_enabled());
        assert!(db.namespace_names().await.unwrap().is_empty());
        assert!(!ctx.consent_store.read().await);
        assert_eq!(drain(&mut events), vec![Notification::CacheCleared]);
    }

    #[tokio::test]
    async fn test_unknown_message_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = site(&[], &[]);
        let ctx = context(db.clone(), fetcher.clone(), "1", &[], &[]);
        let mut events = ctx.bus.subscribe();

        ControlChannel::new(ctx.clone()).dispatch(ControlMessage::Unknown).await;

        assert!(!ctx.consent.is_enabled());
        assert_eq!(fetcher.calls(), 0);
        assert!(db.namespace_names().await.unwrap().is_empty());
        assert!(drain(&mut events).is_empty());
    }
}
