//! Reclamation of abandoned uploads

use crate::PackageService;
use chrono::Utc;
use pkgreg_errors::Error;
use pkgreg_events::{AppEvent, EventEmitter, FailureContext, SweepEvent};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

impl PackageService {
    /// Remove pending records older than the configured TTL and discard
    /// their staging areas
    ///
    /// Uploads still running in this process keep their records fresh only
    /// until the TTL; one that outlives it fails at commit with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be swept. Staging areas that
    /// cannot be discarded are logged and skipped.
    pub async fn sweep_abandoned(&self) -> Result<usize, Error> {
        let start = Instant::now();
        let ttl = chrono::Duration::from_std(self.pending_ttl)
            .map_err(|e| Error::internal(format!("pending ttl out of range: {e}")))?;
        let cutoff = Utc::now() - ttl;

        self.emit(AppEvent::Sweep(SweepEvent::Started {
            older_than_secs: self.pending_ttl.as_secs(),
        }));

        let catalog = &self.catalog;
        let stale = match self
            .upload
            .retry
            .run("catalog.sweep_pending", &self.events, || {
                catalog.sweep_pending(cutoff)
            })
            .await
        {
            Ok(stale) => stale,
            Err(err) => {
                tracing::warn!(error = %err, "sweep failed");
                self.emit(AppEvent::Sweep(SweepEvent::Failed {
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err);
            }
        };

        for record in &stale {
            if let Err(err) = self.store.discard(&record.location).await {
                tracing::warn!(
                    identity = %record.identity,
                    staging = %record.location,
                    error = %err,
                    "failed to discard abandoned staging area"
                );
                continue;
            }
            tracing::info!(identity = %record.identity, "abandoned upload reclaimed");
            self.emit(AppEvent::Sweep(SweepEvent::Reclaimed {
                identity: record.identity.to_string(),
                staging: record.location.to_string(),
            }));
        }

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.emit(AppEvent::Sweep(SweepEvent::Completed {
            reclaimed: stale.len(),
            duration_ms,
        }));
        Ok(stale.len())
    }

    /// Run [`PackageService::sweep_abandoned`] every `interval` until the
    /// returned handle is aborted
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Failures are already logged and emitted; try again next tick
                let _ = service.sweep_abandoned().await;
            }
        })
    }
}
