//! Background task that physically deletes expired assignments.
//!
//! Runs [`AssignmentService::sweep_expired`] once per interval. A failed sweep
//! is logged and retried on the next tick. Expirations are not written to
//! history.

use std::{sync::Arc, time::Duration};

use segments_core::{service::AssignmentService, store::SegmentStore};
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info};

pub struct Sweeper<S> {
  service:  Arc<AssignmentService<S>>,
  interval: Duration,
}

/// Shorter intervals (including zero) are raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl<S: SegmentStore + 'static> Sweeper<S> {
  pub fn new(service: Arc<AssignmentService<S>>, interval: Duration) -> Self {
    Self { service, interval: interval.max(MIN_INTERVAL) }
  }

  /// Run one sweep, returning the number of assignments removed. Errors are
  /// logged and reported as zero removals.
  pub async fn sweep_once(&self) -> u64 {
    match self.service.sweep_expired().await {
      Ok(0) => {
        debug!("sweep found nothing to expire");
        0
      }
      Ok(removed) => {
        info!(removed, "expired assignments swept");
        removed
      }
      Err(e) => {
        error!(error = %e, "sweep failed");
        0
      }
    }
  }

  /// Spawn the sweep loop. It exits once `shutdown` carries `true` or its
  /// sender is dropped. The first sweep happens one interval after spawning.
  pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = time::interval(self.interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // The first tick completes immediately.
      ticker.tick().await;

      info!(interval = ?self.interval, "sweeper started");
      loop {
        tokio::select! {
          _ = ticker.tick() => {
            self.sweep_once().await;
          }
          changed = shutdown.changed() => {
            if changed.is_err() || *shutdown.borrow() {
              break;
            }
          }
        }
      }
      info!("sweeper stopped");
    })
  }
}
