//! Periodic CRL monitoring
//!
//! Ties the snapshot engine to its collaborators: downloads each configured
//! distribution point, accepts newer issuances into the per distribution
//! point [`SnapshotStore`], reports newly revoked entries and flags the
//! watched targets found on the current CRL.

mod errors;
mod fetcher;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::crl::{
    self, AcceptDecision, CrlEvent, CrlSnapshot, DiffResult, Evaluation, SnapshotArchive,
    SnapshotStore, StoreError,
};
use crate::targets::{NewlyFlaggedTarget, TargetRegistry, reconcile_scoped};

pub use errors::{FetchError, MonitorError, MonitorResult};
pub use fetcher::{CrlFetcher, HttpCrlFetcher};

/// Default time between two checks of the same distribution point.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// What one check of a distribution point did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub distribution_point: String,
    pub decision: AcceptDecision,
    /// Present when a new issuance was accepted.
    pub diff: Option<DiffResult>,
    pub flagged: Vec<NewlyFlaggedTarget>,
    /// Entry count of the current snapshot after the cycle.
    pub revoked_count: usize,
    pub events: Vec<CrlEvent>,
}

/// Watches a set of distribution points.
pub struct CrlMonitor<F, A: SnapshotArchive, R> {
    fetcher: F,
    registry: R,
    distribution_points: Vec<String>,
    stores: HashMap<String, SnapshotStore<A>>,
    check_interval: Duration,
}

impl<F, A, R> CrlMonitor<F, A, R>
where
    F: CrlFetcher,
    A: SnapshotArchive,
    R: TargetRegistry,
{
    /// Create a monitor with one store per distribution point, each backed by
    /// the archive `archive_for` returns for its URL.
    pub fn new<I, S>(
        fetcher: F,
        registry: R,
        distribution_points: I,
        mut archive_for: impl FnMut(&str) -> A,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stores = HashMap::new();
        let mut urls = Vec::new();
        for url in distribution_points {
            let url = url.into();
            if stores.contains_key(&url) {
                warn!("Ignoring repeated distribution point {}", url);
                continue;
            }
            stores.insert(url.clone(), SnapshotStore::new(archive_for(&url)));
            urls.push(url);
        }

        Self {
            fetcher,
            registry,
            distribution_points: urls,
            stores,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn distribution_points(&self) -> &[String] {
        &self.distribution_points
    }

    pub fn store(&self, distribution_point: &str) -> Option<&SnapshotStore<A>> {
        self.stores.get(distribution_point)
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Seed every empty store with its most recently archived issuance.
    ///
    /// Returns how many stores were restored. Failures are logged and leave
    /// the store empty, so the next fetch bootstraps it as before.
    pub async fn restore_all(&self) -> usize {
        let mut restored = 0;

        for url in &self.distribution_points {
            let Some(store) = self.stores.get(url) else {
                continue;
            };
            match store.restore().await {
                Ok(Some(snapshot)) => {
                    info!(
                        distribution_point = %url,
                        id = %snapshot.identifier(),
                        revoked_count = snapshot.len(),
                        "Restored CRL from archive"
                    );
                    restored += 1;
                }
                Ok(None) => debug!("Nothing to restore for {}", url),
                Err(e) => warn!("Could not restore archived CRL for {}: {}", url, e),
            }
        }

        restored
    }

    /// Fetch, accept, diff and reconcile one distribution point.
    ///
    /// Fetch and parse failures leave the store untouched. Targets are
    /// reconciled on every cycle, so a registry failure after an accepted
    /// issuance is caught up on the next one. Only targets checked against
    /// this distribution point are considered.
    pub async fn run_cycle(&self, distribution_point: &str) -> MonitorResult<CycleReport> {
        let store = self
            .stores
            .get(distribution_point)
            .ok_or_else(|| MonitorError::UnknownDistributionPoint(distribution_point.to_string()))?;

        let raw = self.fetcher.fetch(distribution_point).await?;
        let parsed = crl::parse(&raw)?;

        let mut events = Vec::new();
        record(distribution_point, &mut events, parsed.events());

        let snapshot = parsed.snapshot;
        if snapshot.is_expired_at(Utc::now())
            && let Some(next_update_at) = snapshot.next_update_at()
        {
            record(
                distribution_point,
                &mut events,
                vec![CrlEvent::CrlExpired {
                    crl_number: snapshot.crl_number().cloned(),
                    next_update_at,
                }],
            );
        }

        let predecessor = match store.evaluate(&snapshot) {
            Evaluation::Newer { .. } => predecessor(store, &snapshot).await?,
            _ => None,
        };

        let decision = store.accept(snapshot).await?;
        record(distribution_point, &mut events, decision.events());

        let diff = match &decision {
            AcceptDecision::Accepted {
                snapshot, previous, ..
            } => {
                let base = predecessor.or_else(|| previous.clone());
                let result = crl::diff(base.as_deref(), snapshot);
                record(distribution_point, &mut events, result.events());
                Some(result)
            }
            _ => None,
        };

        let current = store.get_current();
        let flagged = match &current {
            Some(current) => {
                let targets = self
                    .registry
                    .load_targets()
                    .await
                    .map_err(MonitorError::Registry)?;

                let watched = self.distribution_points.len();
                let unscoped = targets
                    .iter()
                    .filter(|target| target.distribution_point.is_none())
                    .count();
                if watched > 1 && unscoped > 0 {
                    warn!(
                        distribution_point,
                        unscoped, "Skipping targets without a distribution point"
                    );
                }

                let reconciliation = reconcile_scoped(current, &targets, |target| {
                    target.is_checked_against(distribution_point, watched)
                });
                if reconciliation.changed() {
                    self.registry
                        .save_targets(&reconciliation.targets)
                        .await
                        .map_err(MonitorError::Registry)?;
                }
                record(distribution_point, &mut events, reconciliation.events());
                reconciliation.flagged
            }
            None => Vec::new(),
        };

        let revoked_count = current.as_ref().map_or(0, |snapshot| snapshot.len());
        info!(
            distribution_point,
            revoked_count,
            flagged = flagged.len(),
            "CRL check complete"
        );

        Ok(CycleReport {
            distribution_point: distribution_point.to_string(),
            decision,
            diff,
            flagged,
            revoked_count,
            events,
        })
    }

    /// Run one cycle for every distribution point, logging failures.
    pub async fn run_all(&self) -> Vec<(String, MonitorResult<CycleReport>)> {
        let mut results = Vec::with_capacity(self.distribution_points.len());

        for url in &self.distribution_points {
            let result = self.run_cycle(url).await;
            if let Err(e) = &result {
                error!("CRL check for {} failed: {}", url, e);
            }
            results.push((url.clone(), result));
        }

        results
    }

    /// Check every distribution point on each tick until `shutdown` resolves.
    ///
    /// The first tick fires immediately.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        if self.distribution_points.is_empty() {
            warn!("No CRL distribution points configured, monitor not started");
            return;
        }
        if self.check_interval.is_zero() {
            error!("CRL check interval must be greater than zero, monitor not started");
            return;
        }

        debug!(
            "Starting CRL monitor with interval of {} seconds",
            self.check_interval.as_secs()
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping CRL monitor");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("Running scheduled CRL check");
                    self.run_all().await;
                }
            }
        }
    }
}

/// The issuance numbered one below `snapshot`, if it can be found.
///
/// An unreadable archived copy only costs the precise baseline and the diff
/// falls back to the snapshot being replaced. An unavailable archive is
/// still an error.
async fn predecessor<A: SnapshotArchive>(
    store: &SnapshotStore<A>,
    snapshot: &CrlSnapshot,
) -> MonitorResult<Option<Arc<CrlSnapshot>>> {
    match store.lookup_predecessor(snapshot).await {
        Ok(found) => Ok(found),
        Err(e @ StoreError::Archive(_)) => Err(e.into()),
        Err(e) => {
            warn!("Ignoring unusable archived CRL: {}", e);
            Ok(None)
        }
    }
}

fn record(distribution_point: &str, events: &mut Vec<CrlEvent>, new_events: Vec<CrlEvent>) {
    for event in &new_events {
        event.log(distribution_point);
    }
    events.extend(new_events);
}
