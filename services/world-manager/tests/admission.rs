use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use worldfleet_id::{Location, PlayerId, WorldId, WorldKey};
use worldfleet_manager::{
    admission::{AdmissionError, AdmissionService},
    host::MockHost,
    models::{HostedSession, WorldSession},
    registry::{MemoryRegistry, Registry},
};
use worldfleet_reconcile::SessionStatus;

const LOCATION: &str = "us-east-1";

struct Fixture {
    registry: Arc<MemoryRegistry>,
    host: Arc<MockHost>,
    admission: AdmissionService,
}

/// A synced world tracked in the registry and running on the host.
fn fixture(world: &str, count: Option<i32>, max_players: i32) -> Fixture {
    let now = Utc::now();
    let game_session_id = format!("gsess-{world}");

    let registry = Arc::new(MemoryRegistry::with_sessions([WorldSession {
        location: LOCATION.parse().unwrap(),
        world_id: world.parse().unwrap(),
        status: SessionStatus::Active,
        creation_time: now,
        last_updated_time: count.map(|_| now),
        current_player_session_count: count,
        max_players,
        world_map: "map".to_string(),
        dynamic_world: false,
        game_session_id: count.map(|_| game_session_id.parse().unwrap()),
    }]));

    let host = Arc::new(MockHost::new());
    host.insert_session(
        HostedSession {
            location: LOCATION.parse().unwrap(),
            instance_name: world.parse().unwrap(),
            status: SessionStatus::Active,
            game_session_id: game_session_id.parse().unwrap(),
            current_player_session_count: count.unwrap_or(0),
            creation_time: now,
        },
        max_players,
    );

    let admission = AdmissionService::new(registry.clone(), host.clone());
    Fixture {
        registry,
        host,
        admission,
    }
}

fn ids(world: &str, player: &str) -> (Location, WorldId, PlayerId) {
    (
        LOCATION.parse().unwrap(),
        world.parse().unwrap(),
        player.parse().unwrap(),
    )
}

async fn stored_count(registry: &MemoryRegistry, world: &str) -> Option<i32> {
    let key = WorldKey::new(LOCATION.parse().unwrap(), world.parse().unwrap());
    registry
        .get(&key)
        .await
        .unwrap()
        .and_then(|s| s.current_player_session_count)
}

#[tokio::test]
async fn admits_player_and_increments_counter() {
    let f = fixture("castle", Some(4), 10);
    let (location, world, player) = ids("castle", "player-1");

    let reservation = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap();

    assert_eq!(reservation.player_id, player);
    assert_eq!(reservation.game_session_id.as_str(), "gsess-castle");
    assert_eq!(stored_count(&f.registry, "castle").await, Some(5));
}

#[tokio::test]
async fn unknown_world_is_not_found() {
    let f = fixture("castle", Some(0), 10);
    let (location, world, player) = ids("dungeon", "player-1");

    let err = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::WorldNotFound(_)));
}

#[tokio::test]
async fn unsynced_world_is_not_ready() {
    let f = fixture("castle", None, 10);
    let (location, world, player) = ids("castle", "player-1");

    let err = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::WorldNotReady(_)));
    assert_eq!(f.host.sessions()[0].current_player_session_count, 0);
}

#[tokio::test]
async fn full_world_is_rejected_without_asking_the_host() {
    let f = fixture("castle", Some(10), 10);
    f.host
        .set_reject_reservations(Some("host should not be called".to_string()));
    let (location, world, player) = ids("castle", "player-1");

    let err = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::WorldFull {
            current: 10,
            max: 10,
            ..
        }
    ));
}

#[tokio::test]
async fn host_rejection_leaves_counter_untouched() {
    let f = fixture("castle", Some(2), 10);
    f.host
        .set_reject_reservations(Some("player session limit reached".to_string()));
    let (location, world, player) = ids("castle", "player-1");

    let err = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap_err();

    match err {
        AdmissionError::ReservationRejected { reason } => {
            assert_eq!(reason, "player session limit reached")
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(stored_count(&f.registry, "castle").await, Some(2));
}

#[tokio::test]
async fn stale_counter_defers_to_host() {
    // Registry thinks there is room; the host session is already full.
    let f = fixture("castle", Some(3), 10);
    let hosted = f.host.sessions()[0].game_session_id.clone();
    for i in 0..7 {
        let player: PlayerId = format!("early-{i}").parse().unwrap();
        f.host_reserve(&hosted, &player).await;
    }
    let (location, world, player) = ids("castle", "late");

    let err = f
        .admission
        .admit_player(&location, &world, &player)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::ReservationRejected { .. }));
    assert_eq!(stored_count(&f.registry, "castle").await, Some(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_do_not_lose_increments() {
    let f = Arc::new(fixture("castle", Some(0), 100));

    let joins = (0..50).map(|i| {
        let f = f.clone();
        async move {
            let (location, world, player) = ids("castle", &format!("player-{i}"));
            tokio::spawn(async move { f.admission.admit_player(&location, &world, &player).await })
                .await
                .unwrap()
        }
    });
    let results = join_all(joins).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(stored_count(&f.registry, "castle").await, Some(50));
    assert_eq!(f.host.sessions()[0].current_player_session_count, 50);
}

impl Fixture {
    /// Take a slot on the host directly, bypassing admission.
    async fn host_reserve(
        &self,
        game_session_id: &worldfleet_id::GameSessionId,
        player: &PlayerId,
    ) {
        use worldfleet_manager::host::HostClient;
        self.host
            .create_reservation(game_session_id, player)
            .await
            .unwrap();
    }
}
