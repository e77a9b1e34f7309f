//! Periodic reconciliation worker shared by both actors.
//!
//! The store has no change notifications, so each actor re-reads its
//! counterpart on a fixed period. A tick that is still running when the next
//! one is due causes that next tick to be skipped, never queued.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::sync::core::errors::SyncResult;

/// Boxed future type for a reconciliation tick.
pub type TickFuture<'a> = Pin<Box<dyn Future<Output = SyncResult<TickOutcome>> + Send + 'a>>;

/// What one completed tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages pulled in from the counterpart view.
    pub merged: usize,
    /// Whether the actor wrote its own key.
    pub wrote: bool,
    /// Whether the visible state changed.
    pub rerender: bool,
}

/// Result of asking an actor to tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running.
    Skipped,
    /// The tick ran to completion.
    Completed(TickReport),
}

impl TickOutcome {
    /// Report of a completed tick.
    #[must_use]
    pub const fn report(&self) -> Option<&TickReport> {
        match self {
            Self::Skipped => None,
            Self::Completed(report) => Some(report),
        }
    }
}

/// An actor that can reconcile with the shared store.
pub trait Reconcile: Send + Sync + 'static {
    /// Short label for logs.
    fn label(&self) -> &'static str;

    /// Run one reconciliation pass.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn tick(&self) -> TickFuture<'_>;
}

/// Non-reentrant busy flag serializing an actor's ticks.
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    /// Create a cleared flag.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag, or return `None` when it is already set.
    #[must_use]
    pub fn try_enter(&self) -> Option<BusyGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.0))
    }

    /// Whether a tick is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the busy flag when dropped.
#[derive(Debug)]
pub struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives an actor's ticks on a fixed period.
pub struct Poller<R> {
    actor: Arc<R>,
    period: Duration,
    shutdown: Arc<Notify>,
}

impl<R: Reconcile> Poller<R> {
    /// Create a poller for `actor`.
    #[must_use]
    pub fn new(actor: Arc<R>, period: Duration) -> Self {
        Self {
            actor,
            period,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Notifier that stops the poller; signal it with `notify_one`.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the poll loop as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let label = self.actor.label();
        info!(actor = label, period = ?self.period, "Starting poller");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.actor.tick().await {
                        Ok(TickOutcome::Completed(report)) => {
                            if report.rerender {
                                debug!(actor = label, merged = report.merged, wrote = report.wrote, "Tick changed state");
                            }
                        }
                        Ok(TickOutcome::Skipped) => {
                            debug!(actor = label, "Tick skipped, previous tick still running");
                        }
                        Err(err) => {
                            warn!(actor = label, %err, "Tick failed");
                        }
                    }
                }
                () = self.shutdown.notified() => {
                    info!(actor = label, "Poller shutting down");
                    break;
                }
            }
        }
    }
}
