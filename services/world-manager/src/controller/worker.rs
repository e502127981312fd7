//! Controller background worker.
//!
//! Runs a reconciliation pass on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::{ControllerError, WorldController};

/// Worker that drives the controller on a timer.
pub struct ControllerWorker {
    controller: Arc<WorldController>,
    interval: Duration,
}

impl ControllerWorker {
    /// Create a new controller worker.
    pub fn new(controller: Arc<WorldController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting controller worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Controller worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        match self.controller.run_pass().await {
            Ok(stats) => debug!(?stats, "Controller tick complete"),
            Err(ControllerError::PassInProgress) => {
                warn!("Previous reconciliation pass still running, skipping tick");
            }
            Err(ControllerError::ConsistencyRisk { key, source }) => {
                error!(
                    location = %key.location,
                    world_id = %key.world_id,
                    error = %source,
                    "Deployed session is not tracked; duplicate deploy possible, operator action required"
                );
            }
            Err(e) => error!(error = %e, "Reconciliation pass failed"),
        }
    }
}
