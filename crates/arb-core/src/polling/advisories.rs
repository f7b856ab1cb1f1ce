use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    messaging::port::NotificationChannel, ports::AdvisorySource, registry::RecipientRegistry,
    seen::SeenAdvisorySet, Result,
};

/// Counters for one advisory cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub fresh: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Periodically fetches advisories and fans new ones out to every approved recipient.
pub struct AdvisoryPoller {
    source: Arc<dyn AdvisorySource>,
    channel: Arc<dyn NotificationChannel>,
    registry: Arc<RecipientRegistry>,
    // Only one cycle runs at a time; the lock lets a cycle run as its own task.
    seen: Mutex<SeenAdvisorySet>,
    interval: Duration,
}

impl AdvisoryPoller {
    pub fn new(
        source: Arc<dyn AdvisorySource>,
        channel: Arc<dyn NotificationChannel>,
        registry: Arc<RecipientRegistry>,
        seen: SeenAdvisorySet,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            channel,
            registry,
            seen: Mutex::new(seen),
            interval,
        }
    }

    pub async fn seen(&self) -> MutexGuard<'_, SeenAdvisorySet> {
        self.seen.lock().await
    }

    /// Fetch once, deliver unseen advisories, then record the page as seen.
    ///
    /// A failed fetch and an empty page both deliver nothing.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let advisories = self.source.fetch().await?;
        let mut report = CycleReport {
            fetched: advisories.len(),
            ..CycleReport::default()
        };
        if advisories.is_empty() {
            tracing::info!("no advisories found");
            return Ok(report);
        }

        let fresh: Vec<String> = self
            .seen
            .lock()
            .await
            .unseen(&advisories)
            .into_iter()
            .cloned()
            .collect();
        report.fresh = fresh.len();

        if fresh.is_empty() {
            tracing::info!(fetched = report.fetched, "no new advisories");
        } else {
            // Snapshot so the registry lock is not held across network calls.
            let recipients = self.registry.approved_ids().await;
            tracing::info!(
                fresh = fresh.len(),
                recipients = recipients.len(),
                "delivering new advisories"
            );

            for advisory in &fresh {
                for &to in &recipients {
                    if self.channel.notify(to, advisory).await {
                        tracing::debug!(recipient = %to, "advisory delivered");
                        report.delivered += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        // The whole page, so advisories still showing stay ahead of eviction.
        self.seen
            .lock()
            .await
            .insert_all(advisories.iter().map(String::as_str));
        Ok(report)
    }

    /// Run cycles on a fixed interval until `cancel` fires.
    ///
    /// Each cycle runs in its own task so a panic ends that cycle only.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "advisory poller started"
        );

        loop {
            let mut cycle = tokio::spawn({
                let this = self.clone();
                async move { this.run_cycle().await }
            });
            let res = tokio::select! {
                _ = cancel.cancelled() => None,
                res = &mut cycle => Some(res),
            };
            let Some(res) = res else {
                cycle.abort();
                break;
            };

            match res {
                Ok(Ok(report)) => tracing::debug!(?report, "advisory cycle finished"),
                Ok(Err(e)) if e.is_transient() => {
                    tracing::warn!(error = %e, "advisory fetch failed; skipping cycle")
                }
                Ok(Err(e)) => tracing::error!(error = %e, "advisory cycle failed"),
                Err(e) => tracing::error!(error = %e, "advisory cycle aborted"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!("advisory poller stopped");
    }
}
