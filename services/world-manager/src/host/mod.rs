//! Session host interface.
//!
//! The host runs game sessions on a fleet and is the authority on player
//! capacity: its reservation call is the only place a player slot is really
//! taken.
//!
//! - [`HttpHostClient`] talks to the hosting service over HTTP
//! - [`MockHost`] simulates a fleet in memory for dev mode and tests

mod http;
mod mock;

pub use http::HttpHostClient;
pub use mock::MockHost;

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use worldfleet_id::{GameSessionId, Location, PlayerId, WorldId};
use worldfleet_reconcile::RetryPolicy;

use crate::models::{HostedSession, Reservation, UnreadableSession};

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors returned by the session host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Rate limited; the request was not executed.
    #[error("host throttled the request")]
    Throttled,

    /// Network failure; the request may or may not have been executed.
    #[error("host transport error: {0}")]
    Transport(String),

    /// The host refused the request, e.g. a full session.
    #[error("host rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("unexpected host response {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("invalid host response: {0}")]
    Decode(String),
}

impl HostError {
    /// Returns true for failures worth retrying on an idempotent call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled | Self::Transport(_))
    }

    /// Returns true if the request was definitely not executed.
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// A key/value pair handed to the hosted game process at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionProperty {
    pub key: String,
    pub value: String,
}

impl SessionProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Request to start a new game session on the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSessionRequest {
    #[serde(rename = "AliasId")]
    pub fleet_alias: String,

    #[serde(rename = "MaximumPlayerSessionCount")]
    pub max_players: i32,

    pub name: WorldId,

    #[serde(rename = "GameProperties")]
    pub properties: Vec<SessionProperty>,

    pub location: Location,
}

/// One page of a fleet's sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPage {
    pub sessions: Vec<HostedSession>,

    /// Entries that could not be read; they never fail the page.
    pub unreadable: Vec<UnreadableSession>,

    /// Token for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Typed access to the session host.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Start a session; returns the host-assigned id.
    async fn create_session(&self, request: &CreateSessionRequest) -> HostResult<GameSessionId>;

    /// One page of the fleet's sessions.
    async fn list_sessions(
        &self,
        fleet_alias: &str,
        page_size: u32,
        next_token: Option<&str>,
    ) -> HostResult<SessionPage>;

    /// Reserve one player slot in a session.
    async fn create_reservation(
        &self,
        game_session_id: &GameSessionId,
        player_id: &PlayerId,
    ) -> HostResult<Reservation>;
}

/// Run `op` until it succeeds, fails permanently, or `policy` runs out.
///
/// Only errors accepted by `retryable` are retried.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    retryable: fn(&HostError) -> bool,
    mut op: F,
) -> HostResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HostResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) => match policy.backoff_after(attempt) {
                Some(delay) => {
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient host failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_throttling() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "list", HostError::is_transient, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(HostError::Throttled)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: HostResult<()> =
            with_retry(&fast_policy(2), "list", HostError::is_transient, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HostError::Transport("reset".to_string()))
            })
            .await;

        assert!(matches!(result, Err(HostError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: HostResult<()> =
            with_retry(&fast_policy(5), "create", HostError::is_throttled, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HostError::Transport("timeout".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
