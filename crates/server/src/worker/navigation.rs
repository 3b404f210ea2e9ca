//! Cached answer for document loads.
//!
//! Lookup order in versioned-core: the exact request key, then the path-only
//! form (origin + path). A miss that the network cannot answer either is a
//! plain 503 with [`OFFLINE_BODY`].

use lantern_client::path_only;
use lantern_core::StoredResponse;
use url::Url;

use super::WorkerContext;

pub const OFFLINE_BODY: &str = "Offline";

pub async fn lookup(ctx: &WorkerContext, url: &Url) -> Option<StoredResponse> {
    let namespace = ctx.registry.versioned_core();
    let exact = url.to_string();
    let stripped = path_only(url);

    for key in [exact.as_str(), stripped.as_str()] {
        match ctx.db.get_entry(namespace, key).await {
            Ok(Some(entry)) => {
                tracing::debug!(namespace, key, "navigation served from cache");
                return Some(entry);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(namespace, key, error = %e, "navigation cache lookup failed"),
        }
    }

    tracing::debug!(url = %url, "navigation not cached");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{ScriptedFetcher, context, url};
    use lantern_core::CacheDb;

    #[tokio::test]
    async fn test_exact_key_hit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), ScriptedFetcher::new(), "1", &[], &[]);
        let page = StoredResponse::new(200, "talo, results");
        db.put_entry("lantern-core-1", url("/word/talo?q=1").as_str(), &page)
            .await
            .unwrap();

        let got = lookup(&ctx, &url("/word/talo?q=1")).await;
        assert_eq!(got, Some(page));
    }

    #[tokio::test]
    async fn test_path_only_hit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), ScriptedFetcher::new(), "1", &[], &[]);
        let page = StoredResponse::new(200, "talo");
        db.put_entry("lantern-core-1", url("/word/talo").as_str(), &page)
            .await
            .unwrap();

        let got = lookup(&ctx, &url("/word/talo?highlight=2")).await;
        assert_eq!(got, Some(page));
    }

    #[tokio::test]
    async fn test_miss_is_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), ScriptedFetcher::new(), "1", &[], &[]);
        db.put_entry("lantern-core-1", url("/").as_str(), &StoredResponse::new(200, "home"))
            .await
            .unwrap();

        assert_eq!(lookup(&ctx, &url("/never-seen")).await, None);
    }

    #[tokio::test]
    async fn test_only_versioned_core_is_consulted() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ctx = context(db.clone(), ScriptedFetcher::new(), "1", &[], &[]);
        db.put_entry("lantern-morphology-data", url("/word/talo").as_str(), &StoredResponse::new(200, "x"))
            .await
            .unwrap();

        assert_eq!(lookup(&ctx, &url("/word/talo")).await, None);
    }
}
