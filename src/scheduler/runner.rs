//! Scheduler background loop.
//!
//! A single tokio task wakes on a fixed interval, snapshots the
//! destination mapping, and runs both delivery evaluations for every
//! destination. One failing chat never aborts the tick for the rest;
//! permanently unreachable chats are dropped from the store.

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::delivery::Deliverer;
use crate::error::WirdError;
use crate::store::StateStore;
use crate::trigger::{should_fire, MarkerPolicy};

/// Background scheduler over the whole destination set.
pub struct Scheduler {
    store: Arc<StateStore>,
    deliverer: Deliverer,
    policy: MarkerPolicy,
    tick_interval: Duration,
}

/// Handle for stopping the scheduler loop.
pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for the in-flight tick to finish,
    /// so cursor advancement is never cut off between send and persist.
    pub async fn shutdown(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = self.join.await {
            warn!("scheduler task ended abnormally: {e}");
        }
    }
}

impl Scheduler {
    pub fn new(
        store: Arc<StateStore>,
        deliverer: Deliverer,
        policy: MarkerPolicy,
        tick_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            deliverer,
            policy,
            tick_interval: Duration::from_secs(tick_interval_secs),
        }
    }

    /// Start the scheduler loop.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            info!(
                "scheduler started for {} destination(s), tick every {:?}",
                self.store.len(),
                self.tick_interval
            );
            let mut interval = tokio::time::interval(self.tick_interval);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        self.tick(Local::now().naive_local()).await;
                    }
                }
            }
            info!("scheduler stopped");
        });
        SchedulerHandle {
            stop_tx: Some(stop_tx),
            join,
        }
    }

    /// Evaluate every destination once at `now`.
    pub async fn tick(&self, now: NaiveDateTime) {
        // Re-persist state a failed write left behind before evaluating
        // anything, so a restart cannot double-send an advanced cursor.
        if let Err(e) = self.store.flush() {
            warn!("state flush failed, retrying next tick: {e}");
        }

        let snapshot = self.store.snapshot();
        debug!("tick at {now}: {} destination(s)", snapshot.len());

        for (chat_id, destination) in snapshot {
            if let Some(marker) = should_fire(
                now,
                &destination.page_times,
                destination.pages_active,
                destination.last_pages_marker.as_deref(),
                self.policy,
            ) {
                if let Err(e) = self.deliverer.deliver_pages(&chat_id, &marker).await {
                    let removed = self.handle_failure(&chat_id, "pages", e);
                    if removed {
                        continue;
                    }
                }
            }

            if let Some(marker) = should_fire(
                now,
                &destination.reminder_times,
                destination.reminder_active,
                destination.last_reminder_marker.as_deref(),
                self.policy,
            ) {
                if let Err(e) = self
                    .deliverer
                    .deliver_reminder(&chat_id, &marker, now.date())
                    .await
                {
                    self.handle_failure(&chat_id, "reminder", e);
                }
            }
        }
    }

    /// Classify a delivery failure. Returns `true` when the destination
    /// was removed from the store.
    fn handle_failure(&self, chat_id: &str, kind: &str, err: WirdError) -> bool {
        match err {
            WirdError::Unreachable(reason) => {
                warn!("chat {chat_id} unreachable during {kind} delivery, removing: {reason}");
                if let Err(e) = self.store.remove(chat_id) {
                    error!("failed to remove unreachable chat {chat_id}: {e}");
                }
                true
            }
            WirdError::Transient(reason) => {
                warn!("{kind} delivery to chat {chat_id} skipped this tick: {reason}");
                false
            }
            WirdError::Persistence(reason) => {
                // In-memory state is already advanced; the flush at the
                // start of the next tick rewrites the file.
                error!("state not persisted after {kind} delivery to chat {chat_id}: {reason}");
                false
            }
            other => {
                warn!("{kind} delivery to chat {chat_id} failed: {other}");
                false
            }
        }
    }
}
