//! Player admission.
//!
//! Admission checks the registry's player counter first and turns players
//! away from worlds that look full without calling the host. The counter may
//! be stale, so the host's reservation call has the final word. After a
//! granted reservation the counter is bumped with an atomic add so that
//! concurrent admissions never lose an increment.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument};
use worldfleet_id::{Location, PlayerId, WorldId, WorldKey};

use crate::host::{HostClient, HostError};
use crate::models::Reservation;
use crate::registry::{Registry, RegistryError};

/// Result type for admission.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// Why a player was not admitted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("world {0} does not exist")]
    WorldNotFound(WorldKey),

    /// The world has not been synced from the host yet.
    #[error("world {0} is not ready yet")]
    WorldNotReady(WorldKey),

    #[error("world {key} is full ({current}/{max} players)")]
    WorldFull {
        key: WorldKey,
        current: i32,
        max: i32,
    },

    /// The host refused the reservation.
    #[error("reservation rejected: {reason}")]
    ReservationRejected { reason: String },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The host failed without answering the reservation.
    #[error("host error: {0}")]
    Host(HostError),
}

impl From<HostError> for AdmissionError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Rejected { reason } => Self::ReservationRejected { reason },
            other => Self::Host(other),
        }
    }
}

/// Admits players into running worlds.
#[derive(Clone)]
pub struct AdmissionService {
    registry: Arc<dyn Registry>,
    host: Arc<dyn HostClient>,
}

impl AdmissionService {
    pub fn new(registry: Arc<dyn Registry>, host: Arc<dyn HostClient>) -> Self {
        Self { registry, host }
    }

    /// Reserve a slot for `player_id` in the world `(location, world_id)`.
    ///
    /// Reservations are never retried: a repeated call after a lost response
    /// could reserve twice.
    #[instrument(skip_all, fields(location = %location, world_id = %world_id, player_id = %player_id))]
    pub async fn admit_player(
        &self,
        location: &Location,
        world_id: &WorldId,
        player_id: &PlayerId,
    ) -> AdmissionResult<Reservation> {
        let key = WorldKey::new(location.clone(), world_id.clone());

        let session = self
            .registry
            .get(&key)
            .await?
            .ok_or_else(|| AdmissionError::WorldNotFound(key.clone()))?;

        let (Some(current), Some(game_session_id)) = (
            session.current_player_session_count,
            session.game_session_id.as_ref(),
        ) else {
            debug!(status = %session.status, "World not synced yet");
            return Err(AdmissionError::WorldNotReady(key));
        };

        if current >= session.max_players {
            debug!(current, max = session.max_players, "World full");
            return Err(AdmissionError::WorldFull {
                key,
                current,
                max: session.max_players,
            });
        }

        let reservation = self
            .host
            .create_reservation(game_session_id, player_id)
            .await?;

        // The slot is taken on the host whatever happens to the counter; the
        // next sync overwrites it with the host's count.
        match self.registry.increment_player_count(&key, 1).await {
            Ok(true) => {}
            Ok(false) => error!(
                player_session_id = %reservation.player_session_id,
                "World record vanished before its player counter was updated"
            ),
            Err(e) => error!(
                player_session_id = %reservation.player_session_id,
                error = %e,
                "Failed to update player counter after reservation"
            ),
        }

        info!(
            player_session_id = %reservation.player_session_id,
            game_session_id = %game_session_id,
            "Player admitted"
        );
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_maps_to_reservation_rejected() {
        let err = AdmissionError::from(HostError::Rejected {
            reason: "full".to_string(),
        });
        assert!(matches!(err, AdmissionError::ReservationRejected { reason } if reason == "full"));
    }

    #[test]
    fn test_transport_failure_maps_to_host() {
        let err = AdmissionError::from(HostError::Transport("reset".to_string()));
        assert!(matches!(err, AdmissionError::Host(HostError::Transport(_))));
    }
}
