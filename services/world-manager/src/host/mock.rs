//! In-memory session host for dev mode and tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use worldfleet_id::{GameSessionId, PlayerId, PlayerSessionId, WorldId, WorldKey};
use worldfleet_reconcile::SessionStatus;

use super::{CreateSessionRequest, HostClient, HostError, HostResult, SessionPage};
use crate::models::{HostedSession, Reservation};

#[derive(Debug, Clone)]
struct MockSession {
    hosted: HostedSession,
    max_players: i32,
}

#[derive(Default)]
struct MockState {
    sessions: Vec<MockSession>,
    created: Vec<CreateSessionRequest>,
    failing_names: HashSet<WorldId>,
    fail_all_creates: bool,
    reject_reason: Option<String>,
}

/// Simulated fleet.
///
/// Sessions are listed in creation order. Reservations enforce each session's
/// player capacity, like the real host does.
pub struct MockHost {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    list_calls: AtomicUsize,

    /// Provisioning sessions older than this report as active. `None` keeps
    /// them provisioning until [`MockHost::set_status`] is called.
    boot_delay: Option<Duration>,
}

impl MockHost {
    /// Create an empty host whose sessions never finish booting on their own.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_id: AtomicU64::new(1),
            list_calls: AtomicUsize::new(0),
            boot_delay: None,
        }
    }

    /// Create a host whose sessions become active after `boot_delay`.
    pub fn auto_activating(boot_delay: Duration) -> Self {
        Self {
            boot_delay: Some(boot_delay),
            ..Self::new()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens in a failing test; keep going.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an existing session.
    pub fn insert_session(&self, hosted: HostedSession, max_players: i32) {
        self.lock().sessions.push(MockSession {
            hosted,
            max_players,
        });
    }

    /// Change the status of every session with the given key.
    pub fn set_status(&self, key: &WorldKey, status: SessionStatus) {
        for session in self
            .lock()
            .sessions
            .iter_mut()
            .filter(|s| &s.hosted.key() == key)
        {
            session.hosted.status = status;
        }
    }

    /// Make session creation fail for one instance name.
    pub fn fail_creates_for(&self, name: WorldId) {
        self.lock().failing_names.insert(name);
    }

    /// Make every session creation fail (or succeed again).
    pub fn set_fail_all_creates(&self, fail: bool) {
        self.lock().fail_all_creates = fail;
    }

    /// Reject every reservation with `reason`, or stop rejecting with `None`.
    pub fn set_reject_reservations(&self, reason: Option<String>) {
        self.lock().reject_reason = reason;
    }

    /// Create requests received so far, successful or not.
    pub fn created(&self) -> Vec<CreateSessionRequest> {
        self.lock().created.clone()
    }

    /// Current sessions.
    pub fn sessions(&self) -> Vec<HostedSession> {
        self.lock()
            .sessions
            .iter()
            .map(|s| s.hosted.clone())
            .collect()
    }

    /// Number of list pages served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostClient for MockHost {
    async fn create_session(&self, request: &CreateSessionRequest) -> HostResult<GameSessionId> {
        let mut state = self.lock();
        state.created.push(request.clone());

        if state.fail_all_creates || state.failing_names.contains(&request.name) {
            return Err(HostError::Unexpected {
                status: 400,
                body: format!("[MOCK] fleet cannot place {}", request.name),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = GameSessionId::parse(&format!("gsess-{n:06}"))
            .map_err(|e| HostError::Decode(e.to_string()))?;

        info!(
            name = %request.name,
            location = %request.location,
            game_session_id = %id,
            "[MOCK] Created game session"
        );

        state.sessions.push(MockSession {
            hosted: HostedSession {
                location: request.location.clone(),
                instance_name: request.name.clone(),
                status: SessionStatus::Provisioning,
                game_session_id: id.clone(),
                current_player_session_count: 0,
                creation_time: Utc::now(),
            },
            max_players: request.max_players,
        });

        Ok(id)
    }

    async fn list_sessions(
        &self,
        _fleet_alias: &str,
        page_size: u32,
        next_token: Option<&str>,
    ) -> HostResult<SessionPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| HostError::Rejected {
                    reason: format!("invalid next token {token}"),
                })?,
            None => 0,
        };

        let mut state = self.lock();

        if let Some(delay) = self.boot_delay {
            let now = Utc::now();
            for session in state.sessions.iter_mut() {
                let booted = (now - session.hosted.creation_time)
                    .to_std()
                    .map(|age| age >= delay)
                    .unwrap_or(false);
                if session.hosted.status == SessionStatus::Provisioning && booted {
                    session.hosted.status = SessionStatus::Active;
                }
            }
        }

        let page_size = page_size.max(1) as usize;
        let sessions: Vec<_> = state
            .sessions
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|s| s.hosted.clone())
            .collect();
        let end = offset + sessions.len();
        let next = (end < state.sessions.len()).then(|| end.to_string());

        debug!(offset, returned = sessions.len(), "[MOCK] Listed game sessions");
        Ok(SessionPage {
            sessions,
            unreadable: Vec::new(),
            next,
        })
    }

    async fn create_reservation(
        &self,
        game_session_id: &GameSessionId,
        player_id: &PlayerId,
    ) -> HostResult<Reservation> {
        let mut state = self.lock();

        if let Some(reason) = state.reject_reason.clone() {
            return Err(HostError::Rejected { reason });
        }

        let session = state
            .sessions
            .iter_mut()
            .find(|s| &s.hosted.game_session_id == game_session_id)
            .ok_or_else(|| HostError::Rejected {
                reason: format!("game session {game_session_id} not found"),
            })?;

        if session.hosted.status != SessionStatus::Active {
            return Err(HostError::Rejected {
                reason: format!(
                    "game session {game_session_id} is {}",
                    session.hosted.status
                ),
            });
        }

        if session.hosted.current_player_session_count >= session.max_players {
            return Err(HostError::Rejected {
                reason: format!("game session {game_session_id} is full"),
            });
        }

        session.hosted.current_player_session_count += 1;
        let player_session_id = PlayerSessionId::parse(&format!("psess-{}", uuid::Uuid::new_v4()))
            .map_err(|e| HostError::Decode(e.to_string()))?;

        Ok(Reservation {
            player_session_id,
            player_id: player_id.clone(),
            game_session_id: game_session_id.clone(),
            location: Some(session.hosted.location.clone()),
            status: "RESERVED".to_string(),
            ip_address: Some("127.0.0.1".to_string()),
            dns_name: None,
            port: Some(7777),
            creation_time: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SessionProperty;

    fn request(name: &str, max_players: i32) -> CreateSessionRequest {
        CreateSessionRequest {
            fleet_alias: "alias".to_string(),
            max_players,
            name: name.parse().unwrap(),
            properties: vec![SessionProperty::new("WorldMap", "map")],
            location: "us-east-1".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let host = MockHost::new();
        host.create_session(&request("a", 2)).await.unwrap();
        host.create_session(&request("b", 2)).await.unwrap();
        host.create_session(&request("c", 2)).await.unwrap();

        let first = host.list_sessions("alias", 2, None).await.unwrap();
        assert_eq!(first.sessions.len(), 2);
        let second = host
            .list_sessions("alias", 2, first.next.as_deref())
            .await
            .unwrap();
        assert_eq!(second.sessions.len(), 1);
        assert!(second.next.is_none());
        assert_eq!(host.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_creates() {
        let host = MockHost::new();
        host.fail_creates_for("bad".parse().unwrap());
        assert!(host.create_session(&request("bad", 2)).await.is_err());
        assert!(host.create_session(&request("good", 2)).await.is_ok());
        assert_eq!(host.created().len(), 2);
        assert_eq!(host.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_reservations_respect_capacity() {
        let host = MockHost::new();
        let id = host.create_session(&request("a", 1)).await.unwrap();
        let key = WorldKey::new("us-east-1".parse().unwrap(), "a".parse().unwrap());

        let player: PlayerId = "p1".parse().unwrap();
        assert!(matches!(
            host.create_reservation(&id, &player).await,
            Err(HostError::Rejected { .. })
        ));

        host.set_status(&key, SessionStatus::Active);
        assert!(host.create_reservation(&id, &player).await.is_ok());
        assert!(matches!(
            host.create_reservation(&id, &player).await,
            Err(HostError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_auto_activating() {
        let host = MockHost::auto_activating(Duration::ZERO);
        host.create_session(&request("a", 2)).await.unwrap();
        let page = host.list_sessions("alias", 10, None).await.unwrap();
        assert_eq!(page.sessions[0].status, SessionStatus::Active);
    }
}
