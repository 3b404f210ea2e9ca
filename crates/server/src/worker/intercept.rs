//! Per-request routing on the consent flag.
//!
//! - Not yet activated, unsafe method, or excluded path: bypass (network only).
//! - Consent disabled: network pass-through, no cache reads or writes.
//! - Consent enabled, subresource: cache-first over every registered
//!   namespace in registry order; a 200 from the network is returned and
//!   a copy written to versioned-core in the background; a transport failure
//!   becomes a synthetic 503.
//! - Consent enabled, navigation: the same registry lookup, then
//!   [`navigation::lookup`]; only a full miss goes to the network, and a
//!   transport failure there is a 503 `Offline`.
//!
//! A request admitted while enabled carries the consent generation it saw.
//! Its background write is dropped if consent changed in the meantime.

use std::sync::Arc;

use lantern_client::{FetchRequest, FetchResponse, Method, canonicalize};
use lantern_core::{Error, StoredResponse};
use tokio::task::JoinHandle;
use url::Url;

use super::{Phase, WorkerContext, navigation};

pub const UNAVAILABLE_BODY: &str = "Service Unavailable: offline and not cached";

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Outside the interceptor's scope.
    Bypass,
    Network,
    Cache,
    /// Synthesized because the network was unreachable.
    Offline,
}

#[derive(Debug)]
pub struct Served {
    pub response: StoredResponse,
    pub source: Source,
    /// Background copy into versioned-core, if one was started.
    pub pending_write: Option<JoinHandle<()>>,
}

impl Served {
    fn new(response: StoredResponse, source: Source) -> Self {
        Self { response, source, pending_write: None }
    }
}

#[derive(Clone)]
pub struct Interceptor {
    ctx: Arc<WorkerContext>,
}

impl Interceptor {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Answer one request.
    ///
    /// # Errors
    ///
    /// Only pass-through requests fail: the upstream error is returned as is.
    pub async fn handle(&self, request: FetchRequest, navigation: bool) -> Result<Served, Error> {
        if self.ctx.phase() != Phase::Activated
            || request.method != Method::GET
            || self.ctx.registry.is_excluded(request.url.path())
        {
            return self.pass_through(request, Source::Bypass).await;
        }

        let token = self.ctx.consent.generation();
        if !self.ctx.consent.is_enabled() {
            return self.pass_through(request, Source::Network).await;
        }

        let key = canonicalize(request.url.as_str()).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut cached = self.lookup(&key).await;
        if cached.is_none() && navigation {
            cached = navigation::lookup(&self.ctx, &key).await;
        }
        if let Some(entry) = cached {
            return Ok(Served::new(entry, Source::Cache));
        }

        let unavailable = if navigation { navigation::OFFLINE_BODY } else { UNAVAILABLE_BODY };
        Ok(self.fetch_and_store(request, key, token, unavailable).await)
    }

    async fn pass_through(&self, request: FetchRequest, source: Source) -> Result<Served, Error> {
        let response = self.ctx.fetcher.fetch(request).await?;
        log_fetch(&response);
        Ok(Served::new(response.to_stored(), source))
    }

    /// First hit for `key` across the registry, in lookup order.
    async fn lookup(&self, key: &Url) -> Option<StoredResponse> {
        for namespace in self.ctx.registry.all_identifiers() {
            match self.ctx.db.get_entry(namespace, key.as_str()).await {
                Ok(Some(entry)) => {
                    tracing::debug!(namespace, key = %key, "cache hit");
                    return Some(entry);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(namespace, key = %key, error = %e, "cache lookup failed"),
            }
        }
        None
    }

    async fn fetch_and_store(&self, request: FetchRequest, key: Url, token: u64, unavailable: &str) -> Served {
        match self.ctx.fetcher.fetch(request).await {
            Ok(response) if response.is_ok() => {
                log_fetch(&response);
                let stored = response.to_stored();
                let pending = self.store_in_background(key, stored.clone(), token);
                Served { response: stored, source: Source::Network, pending_write: Some(pending) }
            }
            Ok(response) => {
                log_fetch(&response);
                Served::new(response.to_stored(), Source::Network)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "fetch failed and nothing cached");
                Served::new(StoredResponse::unavailable(unavailable), Source::Offline)
            }
        }
    }

    fn store_in_background(&self, key: Url, response: StoredResponse, token: u64) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let namespace = ctx.registry.versioned_core();
            if !ctx.consent.is_enabled() || !ctx.consent.is_current(token) {
                tracing::debug!(namespace, key = %key, token, "consent changed, response not cached");
                return;
            }
            if let Err(e) = ctx.store(namespace, &key, &response).await {
                tracing::warn!(namespace, key = %key, error = %e, "failed to cache response");
            }
        })
    }
}

fn log_fetch(response: &FetchResponse) {
    tracing::debug!(
        url = %response.url,
        status = response.status.as_u16(),
        fetch_ms = response.fetch_ms,
        "upstream responded"
    );
}
