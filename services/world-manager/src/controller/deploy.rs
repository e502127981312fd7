//! Desired-state reconciliation: deploy missing, unhealthy and undersized worlds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use worldfleet_id::{WorldId, WorldKey};
use worldfleet_reconcile::{assess, scaling, ScaleDecision, SessionCapacity, SessionHealth};

use super::{ControllerError, ControllerResult, WorldController};
use crate::desired::scan_all_configs;
use crate::host::{with_retry, CreateSessionRequest, HostError, SessionProperty};
use crate::models::{WorldConfig, WorldSession};
use crate::registry::scan_all;

/// Statistics from the reconcile phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub worlds_checked: usize,

    /// Configurations marked for termination.
    pub worlds_skipped: usize,

    pub deploys_succeeded: usize,
    pub deploys_failed: usize,
}

impl WorldController {
    /// Compare every world configuration against the registry and deploy
    /// where needed.
    ///
    /// A failed deploy is logged and the pass moves on to the next world. A
    /// deploy whose record cannot be written ends the pass with
    /// [`ControllerError::ConsistencyRisk`].
    #[instrument(skip(self))]
    pub async fn reconcile_desired_state(
        &self,
        now: DateTime<Utc>,
    ) -> ControllerResult<ReconcileStats> {
        let configs = scan_all_configs(self.configs.as_ref(), self.config.page_size).await?;
        let sessions = scan_all(self.registry.as_ref(), self.config.page_size).await?;
        let by_key: HashMap<WorldKey, &WorldSession> =
            sessions.iter().map(|s| (s.key(), s)).collect();

        debug!(
            configs = configs.len(),
            sessions = sessions.len(),
            "Reconciling desired state"
        );

        let mut stats = ReconcileStats::default();

        for config in &configs {
            if config.terminate_session {
                debug!(
                    location = %config.location,
                    world_id = %config.world_id,
                    "World marked for termination, skipping"
                );
                stats.worlds_skipped += 1;
                continue;
            }
            stats.worlds_checked += 1;

            let instance = if config.dynamic_world {
                self.scale_check(config, &sessions, now)
            } else {
                static_check(config, by_key.get(&config.key()).copied(), now)
            };

            let Some(instance) = instance else {
                continue;
            };

            let name = match instance {
                Instance::Base => config.world_id.clone(),
                Instance::Dynamic => match WorldId::dynamic_instance(&config.world_id, now) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(
                            location = %config.location,
                            world_id = %config.world_id,
                            error = %e,
                            "Cannot name dynamic instance"
                        );
                        stats.deploys_failed += 1;
                        continue;
                    }
                },
            };

            if self.deploy(config, name, now).await? {
                stats.deploys_succeeded += 1;
            } else {
                stats.deploys_failed += 1;
            }
        }

        Ok(stats)
    }

    /// Decide whether a dynamic world needs one more instance.
    fn scale_check(
        &self,
        config: &WorldConfig,
        sessions: &[WorldSession],
        now: DateTime<Utc>,
    ) -> Option<Instance> {
        let instances = sessions
            .iter()
            .filter(|s| s.location == config.location && s.world_id.has_base(&config.world_id))
            .map(|s| SessionCapacity {
                status: s.status,
                creation_time: s.creation_time,
                current_players: s.current_player_session_count,
            });

        match scaling::decide(instances, config.max_players, now) {
            ScaleDecision::Sufficient { free_slots } => {
                debug!(
                    location = %config.location,
                    world_id = %config.world_id,
                    free_slots,
                    "Dynamic world has capacity"
                );
                None
            }
            ScaleDecision::DeployInstance { free_slots } => {
                info!(
                    location = %config.location,
                    world_id = %config.world_id,
                    free_slots,
                    max_players = config.max_players,
                    "Dynamic world short of capacity"
                );
                Some(Instance::Dynamic)
            }
        }
    }

    /// Create a session on the host and record it.
    ///
    /// Returns `Ok(false)` when the host refused; the world is retried on the
    /// next pass.
    async fn deploy(
        &self,
        config: &WorldConfig,
        name: WorldId,
        now: DateTime<Utc>,
    ) -> ControllerResult<bool> {
        let request = CreateSessionRequest {
            fleet_alias: self.config.fleet_alias.clone(),
            max_players: config.max_players,
            name: name.clone(),
            properties: self.session_properties(config),
            location: config.location.clone(),
        };

        // Only throttled creates are repeated; anything else may have gone through.
        let created = with_retry(
            &self.config.retry,
            "create_session",
            HostError::is_throttled,
            || self.host.create_session(&request),
        )
        .await;

        let game_session_id = match created {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    location = %config.location,
                    world_id = %name,
                    error = %e,
                    "Failed to deploy world"
                );
                return Ok(false);
            }
        };

        let mut record = WorldSession::provisioning(config, name, now);
        record.game_session_id = Some(game_session_id.clone());

        if let Err(source) = self.registry.put(&record).await {
            return Err(ControllerError::ConsistencyRisk {
                key: record.key(),
                source,
            });
        }

        info!(
            location = %record.location,
            world_id = %record.world_id,
            game_session_id = %game_session_id,
            dynamic = record.dynamic_world,
            "Deployed world"
        );
        Ok(true)
    }

    fn session_properties(&self, config: &WorldConfig) -> Vec<SessionProperty> {
        vec![
            SessionProperty::new("WorldMap", config.world_map.clone()),
            SessionProperty::new("FleetRoleArn", self.config.fleet_role_arn.clone()),
            SessionProperty::new("WorldConfigTable", self.config.config_table.clone()),
            SessionProperty::new("WorldPlayerDataTable", self.config.player_data_table.clone()),
        ]
    }
}

/// Which instance of a world to deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instance {
    /// The instance named after the world itself.
    Base,
    /// A new timestamp-suffixed instance of a dynamic world.
    Dynamic,
}

/// Decide whether a static world needs its instance (re)deployed.
fn static_check(
    config: &WorldConfig,
    session: Option<&WorldSession>,
    now: DateTime<Utc>,
) -> Option<Instance> {
    let Some(session) = session else {
        info!(
            location = %config.location,
            world_id = %config.world_id,
            "World has no session"
        );
        return Some(Instance::Base);
    };

    match assess(
        session.status,
        session.creation_time,
        session.last_updated_time,
        now,
    ) {
        SessionHealth::Healthy => None,
        SessionHealth::Unhealthy(reason) => {
            warn!(
                location = %config.location,
                world_id = %config.world_id,
                status = %session.status,
                reason = reason.as_str(),
                "World session unhealthy"
            );
            Some(Instance::Base)
        }
    }
}
