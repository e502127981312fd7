//! Reconciliation loop primitives for world session fleets.
//!
//! This library holds the decisions a reconciliation pass makes, separated
//! from the I/O that gathers its inputs. Key concepts:
//!
//! - **Desired state**: which worlds should run (world configurations).
//! - **Observed state**: what the session host reports (hosted sessions).
//! - **Recorded state**: what the registry remembers (world sessions).
//!
//! # Invariants
//!
//! - All functions are pure: same inputs and `now` give the same answer
//! - Session status is a closed set; terminal and live variants never overlap
//! - Capacity arithmetic saturates and never reports negative free slots

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod health;
pub mod scaling;

pub use health::{assess, SessionHealth, UnhealthyReason};
pub use scaling::{ScaleDecision, SessionCapacity};

/// Reconciliation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A status string outside the known lifecycle.
    #[error("unknown session status: {0}")]
    UnknownStatus(String),
}

/// Lifecycle status of a hosted world session.
///
/// Wire form is the upper-case name used by the session host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created on the host, process still booting.
    #[serde(alias = "ACTIVATING")]
    Provisioning,

    /// Accepting players.
    Active,

    /// The hosted process failed.
    Error,

    /// Shutting down.
    Terminating,

    /// Gone.
    Terminated,
}

impl SessionStatus {
    /// Returns true for statuses a session never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }

    /// Returns true if the session is booting or serving players.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Provisioning | Self::Active)
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Active => "ACTIVE",
            Self::Error => "ERROR",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISIONING" | "ACTIVATING" => Ok(Self::Provisioning),
            "ACTIVE" => Ok(Self::Active),
            "ERROR" => Ok(Self::Error),
            "TERMINATING" => Ok(Self::Terminating),
            "TERMINATED" => Ok(Self::Terminated),
            other => Err(ReconcileError::UnknownStatus(other.to_string())),
        }
    }
}

/// Count the live sessions that share `key`.
///
/// Used before deleting the record of a terminal session: if another session
/// under the same key is still booting or active, that one represents the
/// current truth and the record must stay.
pub fn live_sibling_count<I, K, F>(sessions: I, key: &K, describe: F) -> usize
where
    I: IntoIterator,
    K: PartialEq,
    F: Fn(&I::Item) -> (K, SessionStatus),
{
    sessions
        .into_iter()
        .filter(|s| {
            let (k, status) = describe(s);
            &k == key && status.is_live()
        })
        .count()
}

/// Paces a paginated listing so the host's rate limit is respected.
///
/// After every `pages_per_pause` pages, if more pages remain, the caller
/// should wait for the returned duration.
#[derive(Debug, Clone)]
pub struct PagePacer {
    pages_per_pause: u32,
    pause: Duration,
    since_pause: u32,
}

impl PagePacer {
    /// Create a new pacer.
    pub fn new(pages_per_pause: u32, pause: Duration) -> Self {
        Self {
            pages_per_pause: pages_per_pause.max(1),
            pause,
            since_pause: 0,
        }
    }

    /// Record a fetched page. Returns the pause to take before the next one.
    pub fn page_fetched(&mut self, more_pages: bool) -> Option<Duration> {
        self.since_pause += 1;
        if self.since_pause >= self.pages_per_pause && more_pages {
            self.since_pause = 0;
            if self.pause.is_zero() {
                return None;
            }
            return Some(self.pause);
        }
        None
    }
}

impl Default for PagePacer {
    fn default() -> Self {
        Self::new(DEFAULT_PAGES_PER_PAUSE, DEFAULT_PAGE_PAUSE)
    }
}

/// Bounded retry with exponential backoff for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_backoff: Duration,

    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based), or `None` when
    /// attempts are exhausted.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(
            self.initial_backoff
                .saturating_mul(factor)
                .min(self.max_backoff),
        )
    }
}

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Default page size when listing hosted sessions.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pages fetched between rate-limit pauses.
pub const DEFAULT_PAGES_PER_PAUSE: u32 = 5;

/// Length of a rate-limit pause.
pub const DEFAULT_PAGE_PAUSE: Duration = Duration::from_secs(1);

/// Default attempts for transient host failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
