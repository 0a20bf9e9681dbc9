//! Expiration sweep

use crate::manager::SignatureRequestManager;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue requests found at the start of the sweep
    pub examined: usize,
    /// Requests this sweep moved to `Expired`
    pub expired: usize,
    /// Requests already closed by someone else, or that failed to commit
    pub skipped: usize,
    /// Requests left for the next cycle because the sweep was stopped
    pub deferred: usize,
}

/// Periodically expires overdue requests.
///
/// A sweep stops between requests when its interval elapses or shutdown is
/// signalled; unprocessed requests are picked up next cycle.
pub struct ExpirationScheduler {
    manager: Arc<SignatureRequestManager>,
    interval: Duration,
}

impl ExpirationScheduler {
    pub fn new(manager: Arc<SignatureRequestManager>) -> Self {
        let interval = manager.config().sweep_interval();
        Self { manager, interval }
    }

    pub fn with_interval(manager: Arc<SignatureRequestManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Sweep everything overdue right now, without a deadline
    pub async fn sweep_once(&self) -> SweepReport {
        let (_tx, rx) = watch::channel(false);
        self.sweep(None, &rx).await
    }

    async fn sweep(&self, deadline: Option<Instant>, shutdown: &watch::Receiver<bool>) -> SweepReport {
        let due = match self.manager.list_overdue().await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list overdue requests");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            examined: due.len(),
            ..Default::default()
        };

        for (index, request_id) in due.iter().enumerate() {
            let out_of_time = deadline.is_some_and(|d| Instant::now() >= d);
            if *shutdown.borrow() || out_of_time {
                report.deferred = due.len() - index;
                tracing::debug!(deferred = report.deferred, "Sweep stopped early");
                break;
            }

            match self.manager.expire_request(request_id).await {
                Ok(true) => report.expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Failed to expire request");
                    report.skipped += 1;
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                expired = report.expired,
                skipped = report.skipped,
                deferred = report.deferred,
                "Expiration sweep finished"
            );
        }
        report
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let observer = shutdown.clone();

        tracing::info!(interval_secs = self.interval.as_secs(), "Expiration scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let deadline = Instant::now() + self.interval;
                    self.sweep(Some(deadline), &observer).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Expiration scheduler stopped");
    }
}
