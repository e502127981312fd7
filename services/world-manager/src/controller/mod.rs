//! World reconciliation controller.
//!
//! One pass brings the registry toward agreement with the host and the world
//! configurations:
//! - sync: pull every hosted session, refresh tracked records and drop the
//!   records of sessions that ended with no live replacement
//! - reconcile: for every configured world, deploy a session when it is
//!   missing, unhealthy, or (for dynamic worlds) short of free capacity
//!
//! Nothing is rolled back. Work applied before a failure stands, and the next
//! pass picks up from whatever state it finds.

mod deploy;
mod sync;
mod worker;

pub use deploy::ReconcileStats;
pub use sync::SyncStats;
pub use worker::ControllerWorker;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use worldfleet_id::WorldKey;
use worldfleet_reconcile::{
    RetryPolicy, DEFAULT_PAGES_PER_PAUSE, DEFAULT_PAGE_PAUSE, DEFAULT_PAGE_SIZE,
};

use crate::desired::{ConfigProvider, ConfigSourceError};
use crate::host::{HostClient, HostError};
use crate::registry::{Registry, RegistryError};

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that end a reconciliation pass.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Listing the fleet failed after retries.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("config source error: {0}")]
    Config(#[from] ConfigSourceError),

    /// A session was created on the host but its record was not written.
    ///
    /// The next pass will not see a record for it and may deploy a duplicate.
    /// Needs an operator.
    #[error("session deployed for {key} but its record could not be written: {source}")]
    ConsistencyRisk {
        key: WorldKey,
        #[source]
        source: RegistryError,
    },

    #[error("a reconciliation pass is already running")]
    PassInProgress,
}

impl ControllerError {
    pub fn is_consistency_risk(&self) -> bool {
        matches!(self, Self::ConsistencyRisk { .. })
    }
}

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fleet alias sessions are created on and listed from.
    pub fleet_alias: String,

    /// Role the hosted process assumes; passed as a session property.
    pub fleet_role_arn: String,

    /// World configuration table name; passed as a session property.
    pub config_table: String,

    /// Player data table name; passed as a session property.
    pub player_data_table: String,

    pub page_size: u32,
    pub pages_per_pause: u32,
    pub page_pause: Duration,

    /// Retry policy for host calls that are safe to repeat.
    pub retry: RetryPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fleet_alias: String::new(),
            fleet_role_arn: String::new(),
            config_table: "world_configs".to_string(),
            player_data_table: "world_player_data".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            pages_per_pause: DEFAULT_PAGES_PER_PAUSE,
            page_pause: DEFAULT_PAGE_PAUSE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Statistics from one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub sync: SyncStats,
    pub reconcile: ReconcileStats,
}

/// The reconciliation controller.
pub struct WorldController {
    registry: Arc<dyn Registry>,
    host: Arc<dyn HostClient>,
    configs: Arc<dyn ConfigProvider>,
    config: ControllerConfig,

    /// Held for the duration of a pass.
    pass_lock: Mutex<()>,
}

impl WorldController {
    /// Create a new controller.
    pub fn new(
        registry: Arc<dyn Registry>,
        host: Arc<dyn HostClient>,
        configs: Arc<dyn ConfigProvider>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            registry,
            host,
            configs,
            config,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one pass at the current time.
    pub async fn run_pass(&self) -> ControllerResult<PassStats> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass with `now` as the reference time for every decision.
    ///
    /// Fails with [`ControllerError::PassInProgress`] if another pass is
    /// running on this controller.
    #[instrument(skip(self), fields(fleet_alias = %self.config.fleet_alias))]
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> ControllerResult<PassStats> {
        let _pass = self
            .pass_lock
            .try_lock()
            .map_err(|_| ControllerError::PassInProgress)?;

        let sync = self.sync_observed_state(now).await?;
        let reconcile = self.reconcile_desired_state(now).await?;

        info!(
            sessions_seen = sync.sessions_seen,
            records_updated = sync.records_updated,
            records_deleted = sync.records_deleted,
            unreadable_sessions = sync.unreadable,
            worlds_checked = reconcile.worlds_checked,
            deploys_succeeded = reconcile.deploys_succeeded,
            deploys_failed = reconcile.deploys_failed,
            "Reconciliation pass complete"
        );

        Ok(PassStats { sync, reconcile })
    }
}
