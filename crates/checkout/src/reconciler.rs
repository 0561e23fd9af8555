//! Reconciliation scheduler: expires stale holds and reaps dead sessions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use store::{ReservationStore, SessionStore, SkuLedger};

/// Counts from one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pending holds whose stock was restored.
    pub expired_holds: usize,
    /// Sessions deleted along with their cart items.
    pub reaped_sessions: usize,
}

/// Periodic background task restoring stock from abandoned holds.
///
/// Runs on a fixed period, which should sit above realistic webhook latency
/// plus the provider's retry budget so a legitimate in-flight payment rarely
/// races an expiry. The confirmation handler still tolerates the race when
/// it happens; this task only minimizes it.
///
/// Every expired row is handled in its own store call: one failing row is
/// logged and skipped, never aborting the rest of the sweep.
pub struct Reconciler<S> {
    store: S,
    period: Duration,
}

impl<S> Reconciler<S>
where
    S: SkuLedger + SessionStore + ReservationStore,
{
    /// Creates a reconciler sweeping every `period`.
    pub fn new(store: S, period: Duration) -> Self {
        Self { store, period }
    }

    /// Runs the sweep loop until the shutdown channel fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup does not
        // race a deployment's in-flight webhooks.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_once(Utc::now()).await;
                    tracing::info!(
                        expired_holds = report.expired_holds,
                        reaped_sessions = report.reaped_sessions,
                        "reconciliation sweep complete"
                    );
                }
                _ = shutdown.changed() => {
                    tracing::info!("reconciler shutting down");
                    break;
                }
            }
        }
    }

    /// Performs one sweep at the given instant.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        match self.store.expired_pending(now).await {
            Ok(holds) => {
                for hold in holds {
                    // Delete first: only the winner of the conditional
                    // delete releases, so a concurrent cancel or confirm of
                    // the same hold can never double-restore stock.
                    match self.store.delete_pending(hold.id).await {
                        Ok(true) => match self.store.release(&hold.sku, hold.quantity).await {
                            Ok(()) => {
                                metrics::counter!("reservations_expired_total").increment(1);
                                report.expired_holds += 1;
                            }
                            Err(err) => {
                                tracing::warn!(
                                    reservation_id = %hold.id,
                                    sku = %hold.sku,
                                    error = %err,
                                    "failed to restore stock for expired hold"
                                );
                            }
                        },
                        Ok(false) => {}
                        Err(err) => {
                            tracing::warn!(
                                reservation_id = %hold.id,
                                error = %err,
                                "failed to expire hold; will retry next sweep"
                            );
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to list expired holds");
            }
        }

        match self.store.expired_sessions(now).await {
            Ok(session_ids) => {
                for id in session_ids {
                    match self.store.delete_session(id).await {
                        Ok(()) => {
                            metrics::counter!("sessions_reaped_total").increment(1);
                            report.reaped_sessions += 1;
                        }
                        Err(err) => {
                            tracing::warn!(
                                session_id = %id,
                                error = %err,
                                "failed to delete expired session; will retry next sweep"
                            );
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to list expired sessions");
            }
        }

        report
    }
}
