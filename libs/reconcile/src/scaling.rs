//! Capacity-driven scaling for dynamic worlds.
//!
//! A dynamic world runs as many instances as player demand needs. Instead of
//! health-checking one instance by identity, the controller sums the free
//! player slots across every instance that can still take players and adds
//! one more instance when less than a full instance worth of slots remains.

use chrono::{DateTime, Duration, Utc};

use crate::health::BOOT_TIMEOUT_SECS;
use crate::SessionStatus;

/// Capacity-relevant view of one instance of a dynamic world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCapacity {
    pub status: SessionStatus,
    pub creation_time: DateTime<Utc>,
    /// Players currently placed; `None` until the first sync.
    pub current_players: Option<i32>,
}

/// Result of a scaling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Enough free slots remain.
    Sufficient { free_slots: i64 },

    /// Less than one instance worth of free slots remains; deploy another.
    DeployInstance { free_slots: i64 },
}

impl ScaleDecision {
    /// Returns true if a new instance should be deployed.
    pub fn should_deploy(&self) -> bool {
        matches!(self, Self::DeployInstance { .. })
    }
}

/// Free slots of one instance.
///
/// Negative when the instance holds more players than the configured
/// maximum, so an over-full instance eats into the world's total.
pub fn free_slots(max_players: i32, current_players: Option<i32>) -> i64 {
    i64::from(max_players) - i64::from(current_players.unwrap_or(0))
}

/// Returns true if an instance's free slots count toward the world's capacity.
///
/// Active instances count. Provisioning instances count while they are still
/// within the boot window, so a freshly deployed instance is not doubled up on
/// the next pass.
pub fn counts_toward_capacity(
    status: SessionStatus,
    creation_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        SessionStatus::Active => true,
        SessionStatus::Provisioning => now - creation_time < Duration::seconds(BOOT_TIMEOUT_SECS),
        SessionStatus::Error | SessionStatus::Terminating | SessionStatus::Terminated => false,
    }
}

/// Decide whether a dynamic world needs another instance.
///
/// `max_players` is the per-instance capacity from the world configuration.
pub fn decide<I>(instances: I, max_players: i32, now: DateTime<Utc>) -> ScaleDecision
where
    I: IntoIterator<Item = SessionCapacity>,
{
    let free: i64 = instances
        .into_iter()
        .filter(|i| counts_toward_capacity(i.status, i.creation_time, now))
        .map(|i| free_slots(max_players, i.current_players))
        .sum();

    if free < i64::from(max_players) {
        ScaleDecision::DeployInstance { free_slots: free }
    } else {
        ScaleDecision::Sufficient { free_slots: free }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn active(players: i32) -> SessionCapacity {
        SessionCapacity {
            status: SessionStatus::Active,
            creation_time: now() - Duration::hours(2),
            current_players: Some(players),
        }
    }

    fn provisioning(age_secs: i64) -> SessionCapacity {
        SessionCapacity {
            status: SessionStatus::Provisioning,
            creation_time: now() - Duration::seconds(age_secs),
            current_players: None,
        }
    }

    #[test]
    fn test_deploys_when_free_capacity_below_one_instance() {
        // 5 + 10 free = 15 < 20
        let decision = decide([active(15), active(10)], 20, now());
        assert_eq!(decision, ScaleDecision::DeployInstance { free_slots: 15 });
    }

    #[test]
    fn test_no_deploy_when_capacity_sufficient() {
        // 12 + 10 free = 22 >= 20
        let decision = decide([active(8), active(10)], 20, now());
        assert_eq!(decision, ScaleDecision::Sufficient { free_slots: 22 });
    }

    #[test]
    fn test_exactly_one_instance_free_is_sufficient() {
        let decision = decide([active(0)], 20, now());
        assert!(!decision.should_deploy());
    }

    #[test]
    fn test_no_instances_deploys() {
        let decision = decide(std::iter::empty(), 20, now());
        assert_eq!(decision, ScaleDecision::DeployInstance { free_slots: 0 });
    }

    #[test]
    fn test_fresh_provisioning_counts() {
        let decision = decide([provisioning(30)], 20, now());
        assert_eq!(decision, ScaleDecision::Sufficient { free_slots: 20 });
    }

    #[test]
    fn test_stale_provisioning_ignored() {
        let decision = decide([provisioning(301)], 20, now());
        assert!(decision.should_deploy());
    }

    #[rstest]
    #[case(SessionStatus::Error)]
    #[case(SessionStatus::Terminating)]
    #[case(SessionStatus::Terminated)]
    fn test_dead_instances_ignored(#[case] status: SessionStatus) {
        let instance = SessionCapacity {
            status,
            ..active(0)
        };
        assert!(decide([instance], 20, now()).should_deploy());
    }

    #[test]
    fn test_overfull_instance_reduces_total() {
        assert_eq!(free_slots(20, Some(25)), -5);
        // (20 - 30) + (20 - 0) = 10 < 20
        let decision = decide([active(30), active(0)], 20, now());
        assert_eq!(decision, ScaleDecision::DeployInstance { free_slots: 10 });
    }
}
