//! Refresh orchestration.
//!
//! Ties the stock store's staleness selection to the analysis dispatcher:
//! "refresh everything" floods the queue unpaced, "refresh the stale ones"
//! paces dispatch so the periodic sweep stays gentle.

use crate::analysis::JobDispatcher;
use crate::stock_store::StockStore;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Tunables for refresh sweeps.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Age beyond which a priced record counts as stale.
    pub staleness_threshold: Duration,
    /// Pace between job starts in a stale sweep.
    pub stale_pace: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(12 * 60 * 60),
            stale_pace: Duration::from_millis(300),
        }
    }
}

/// Decides which stocks need a refresh and hands them to the dispatcher.
///
/// Only the selection query can fail; once the codes are known, dispatch
/// is fire-and-forget and the call returns the number of jobs enqueued.
pub struct RefreshOrchestrator {
    store: Arc<dyn StockStore>,
    dispatcher: Arc<JobDispatcher>,
    settings: RefreshSettings,
}

impl RefreshOrchestrator {
    pub fn new(
        store: Arc<dyn StockStore>,
        dispatcher: Arc<JobDispatcher>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            settings,
        }
    }

    /// Enqueue a refresh for every stock, unpaced.
    pub fn refresh_all(&self) -> Result<usize> {
        let codes = self.store.list_codes()?;
        info!("Refreshing all {} stocks", codes.len());
        Ok(self.dispatcher.dispatch_batch(&codes, Duration::ZERO))
    }

    /// Enqueue a paced refresh for stocks that are stale: older than the
    /// threshold, or missing a price entirely. `threshold` overrides the
    /// configured default for this sweep only.
    pub fn refresh_stale(&self, threshold: Option<Duration>) -> Result<usize> {
        let threshold = threshold.unwrap_or(self.settings.staleness_threshold);
        let codes = self.store.find_stale(Utc::now().timestamp(), threshold)?;
        info!(
            "Refreshing {} stale stocks (threshold {:?})",
            codes.len(),
            threshold
        );
        Ok(self
            .dispatcher
            .dispatch_batch(&codes, self.settings.stale_pace))
    }
}
