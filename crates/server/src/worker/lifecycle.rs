//! Install and activate transitions.
//!
//! Install takes over immediately instead of waiting for older instances to
//! release their clients. Activate re-derives consent from the stored record;
//! when enabled it re-runs the precache and removes versioned-core namespaces
//! left by earlier deployments. It then claims every client whether or not
//! consent was enabled. Persistent namespaces are never touched here.

use std::sync::Arc;

use lantern_core::Notification;

use super::precache::Precacher;
use super::{Phase, WorkerContext};

#[derive(Clone)]
pub struct Lifecycle {
    ctx: Arc<WorkerContext>,
    precacher: Precacher,
}

impl Lifecycle {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        let precacher = Precacher::new(ctx.clone());
        Self { ctx, precacher }
    }

    pub async fn install(&self) {
        self.ctx.set_phase(Phase::Installed);
        tracing::info!(namespace = self.ctx.registry.versioned_core(), "installed, skipping wait");
    }

    pub async fn activate(&self) {
        self.ctx.set_phase(Phase::Activating);

        let enabled = self.ctx.consent_store.read().await;
        let token = self.ctx.consent.set(enabled);
        tracing::info!(enabled, "activating");

        if enabled {
            self.ctx.bus.publish(Notification::UpdateStarted);
            if let Err(e) = self.precacher.run(token).await {
                tracing::warn!(error = %e, "precache during activation did not complete");
            }
            let removed = self.remove_stale_versions().await;
            tracing::info!(removed, "stale versioned namespaces removed");
            self.ctx.bus.publish(Notification::UpdateComplete);
        }

        self.ctx.set_phase(Phase::Activated);
        tracing::info!("clients claimed");
    }

    async fn remove_stale_versions(&self) -> usize {
        let names = match self.ctx.db.namespace_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate namespaces");
                return 0;
            }
        };

        let mut removed = 0;
        for name in names.iter().filter(|n| self.ctx.registry.is_stale_versioned(n)) {
            match self.ctx.db.delete_namespace(name).await {
                Ok(_) => removed += 1,
                Err(e) => tracing::warn!(namespace = %name, error = %e, "failed to delete stale namespace"),
            }
        }
        removed
    }
}
