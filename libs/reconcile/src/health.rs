//! Health assessment of a recorded world session.
//!
//! A session is judged only from its recorded status and timestamps. The
//! registry's `LastUpdatedTime` is refreshed on every pass that still sees the
//! session on the host, so a stale timestamp means the host stopped reporting it.

use chrono::{DateTime, Duration, Utc};

use crate::SessionStatus;

/// Seconds a session may stay `PROVISIONING` before it is presumed stuck.
pub const BOOT_TIMEOUT_SECS: i64 = 300;

/// Seconds a session may go unreported by the host before it is presumed dead.
pub const REPORT_TIMEOUT_SECS: i64 = 300;

/// Why a session was judged unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhealthyReason {
    /// Still provisioning past the boot timeout.
    BootTimeout,

    /// Not reported by the host within the report timeout.
    NotReported,

    /// The host reports the session in error.
    Errored,
}

impl UnhealthyReason {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootTimeout => "boot_timeout",
            Self::NotReported => "not_reported",
            Self::Errored => "errored",
        }
    }
}

/// Outcome of a health assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionHealth {
    Healthy,
    Unhealthy(UnhealthyReason),
}

impl SessionHealth {
    /// Returns true if the session needs no replacement.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Assess a recorded session at `now`.
///
/// A record that was never synced has no `last_updated_time`; it is measured
/// from its creation time instead. An `ERROR` session is unhealthy but is left
/// in the registry: a replacement may be deployed next to it.
pub fn assess(
    status: SessionStatus,
    creation_time: DateTime<Utc>,
    last_updated_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SessionHealth {
    if status == SessionStatus::Provisioning
        && now - creation_time > Duration::seconds(BOOT_TIMEOUT_SECS)
    {
        return SessionHealth::Unhealthy(UnhealthyReason::BootTimeout);
    }

    let last_seen = last_updated_time.unwrap_or(creation_time);
    if now - last_seen > Duration::seconds(REPORT_TIMEOUT_SECS) {
        return SessionHealth::Unhealthy(UnhealthyReason::NotReported);
    }

    if status == SessionStatus::Error {
        return SessionHealth::Unhealthy(UnhealthyReason::Errored);
    }

    SessionHealth::Healthy
}
