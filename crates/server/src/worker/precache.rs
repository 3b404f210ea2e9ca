//! Bulk and progressive population of the versioned-core namespace.
//!
//! Phase one fetches the root document and every manifest asset and commits
//! them as one batch: a single failed fetch or non-2xx status aborts the run
//! before anything is written. Phase two walks the route list in order. Each
//! route is fetched and stored on a 200. Per-route failures are logged and
//! skipped, and a progress notification follows every route.
//!
//! A run carries the consent generation it started under and stops writing
//! as soon as a later consent change supersedes it.

use std::sync::Arc;

use futures::future::try_join_all;
use lantern_client::resolve;
use lantern_core::{Error, Notification, StoredResponse};
use url::Url;

use super::WorkerContext;

/// Category label on route progress notifications.
pub const ROUTE_CATEGORY: &str = "routes";

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub assets: usize,
    pub routes_cached: usize,
    pub routes_failed: usize,
}

#[derive(Clone)]
pub struct Precacher {
    ctx: Arc<WorkerContext>,
}

impl Precacher {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Run both phases under the consent generation `token`.
    ///
    /// # Errors
    ///
    /// Returns the bulk-phase failure, or `Error::Superseded` if a later
    /// consent change overtook the run. Route failures are not errors.
    pub async fn run(&self, token: u64) -> Result<PrecacheReport, Error> {
        let namespace = self.ctx.registry.versioned_core();
        tracing::info!(namespace, token, "precache started");

        let assets = self.bulk(namespace, token).await?;
        let mut report = PrecacheReport { assets, ..Default::default() };

        let total = self.ctx.routes.len();
        for (index, route) in self.ctx.routes.iter().enumerate() {
            self.ensure_current(token)?;

            match self.cache_route(namespace, route, token).await {
                Ok(()) => report.routes_cached += 1,
                Err(e @ Error::Superseded { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(route = %route, error = %e, "failed to precache route");
                    report.routes_failed += 1;
                }
            }

            self.ctx.bus.publish(Notification::CachingProgress {
                category: ROUTE_CATEGORY.to_string(),
                current: index + 1,
                total,
            });
        }

        tracing::info!(namespace, ?report, "precache finished");
        Ok(report)
    }

    async fn bulk(&self, namespace: &str, token: u64) -> Result<usize, Error> {
        let urls = std::iter::once("/")
            .chain(self.ctx.manifest.assets.iter().map(String::as_str))
            .filter(|path| !self.ctx.registry.is_excluded(path))
            .map(|path| resolve(&self.ctx.origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}"))))
            .collect::<Result<Vec<Url>, Error>>()?;

        let fetches = urls.into_iter().map(|url| self.fetch_asset(url));
        let entries = try_join_all(fetches).await?;
        let count = entries.len();

        self.ensure_current(token)?;
        self.ctx.db.put_entries(namespace, entries).await?;

        tracing::debug!(namespace, count, "stored asset batch");
        Ok(count)
    }

    async fn fetch_asset(&self, url: Url) -> Result<(String, StoredResponse), Error> {
        let response = self.ctx.fetcher.get(url.clone()).await?;
        if !response.status.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", response.status.as_u16())));
        }
        Ok((url.to_string(), response.to_stored()))
    }

    async fn cache_route(&self, namespace: &str, route: &str, token: u64) -> Result<(), Error> {
        if self.ctx.registry.is_excluded(route) {
            return Err(Error::Excluded(route.to_string()));
        }
        let url = resolve(&self.ctx.origin, route).map_err(|e| Error::InvalidUrl(format!("{route}: {e}")))?;
        let response = self.ctx.fetcher.get(url.clone()).await?;

        if !response.is_ok() {
            return Err(Error::HttpError(format!("{url}: status {}", response.status.as_u16())));
        }

        self.ensure_current(token)?;
        self.ctx.store(namespace, &url, &response.to_stored()).await
    }

    fn ensure_current(&self, token: u64) -> Result<(), Error> {
        if self.ctx.consent.is_current(token) {
            Ok(())
        } else {
            Err(Error::Superseded { token, current: self.ctx.consent.generation() })
        }
    }
}
