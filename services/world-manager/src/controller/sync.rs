//! Observed-state sync: host sessions into the registry.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use worldfleet_reconcile::{live_sibling_count, PagePacer};

use super::{ControllerResult, WorldController};
use crate::host::{with_retry, HostError};
use crate::models::{HostedSession, SessionUpdate};

/// Statistics from the sync phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Sessions reported by the host.
    pub sessions_seen: usize,
    pub records_updated: usize,
    pub records_deleted: usize,

    /// Terminal sessions whose record was kept for a live sibling.
    pub terminal_kept: usize,

    /// Live sessions with no registry record.
    pub untracked: usize,

    /// Listing entries that were not valid sessions and were skipped.
    pub unreadable: usize,
}

impl WorldController {
    /// Pull every hosted session and fold it into the registry.
    ///
    /// A terminal session's record is deleted only when no other session with
    /// the same location and name is still booting or active, so the world can
    /// be redeployed under the same key. Live sessions refresh the observed
    /// fields of an existing record; records are never created here.
    #[instrument(skip(self))]
    pub async fn sync_observed_state(&self, now: DateTime<Utc>) -> ControllerResult<SyncStats> {
        let (sessions, unreadable) = self.list_hosted_sessions().await?;
        let mut stats = SyncStats {
            sessions_seen: sessions.len(),
            unreadable,
            ..SyncStats::default()
        };

        for session in &sessions {
            let key = session.key();

            if session.status.is_terminal() {
                let live = live_sibling_count(&sessions, &key, |s| (s.key(), s.status));
                if live > 0 {
                    debug!(
                        location = %key.location,
                        world_id = %key.world_id,
                        status = %session.status,
                        live_siblings = live,
                        "Keeping record of ended session with live sibling"
                    );
                    stats.terminal_kept += 1;
                    continue;
                }

                if self.registry.delete(&key).await? {
                    info!(
                        location = %key.location,
                        world_id = %key.world_id,
                        status = %session.status,
                        "Deleted record of ended session"
                    );
                    stats.records_deleted += 1;
                }
                continue;
            }

            let update = SessionUpdate::observed(session, now);
            if self.registry.update_observed(&key, &update).await? {
                stats.records_updated += 1;
            } else {
                debug!(
                    location = %key.location,
                    world_id = %key.world_id,
                    game_session_id = %session.game_session_id,
                    "Hosted session has no registry record"
                );
                stats.untracked += 1;
            }
        }

        Ok(stats)
    }

    /// Fetch every page of the fleet's sessions, pausing between bursts.
    ///
    /// Returns the readable sessions and how many entries were skipped.
    async fn list_hosted_sessions(&self) -> ControllerResult<(Vec<HostedSession>, usize)> {
        let mut pacer = PagePacer::new(self.config.pages_per_pause, self.config.page_pause);
        let mut sessions = Vec::new();
        let mut unreadable = 0usize;
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = with_retry(
                &self.config.retry,
                "list_sessions",
                HostError::is_transient,
                || {
                    self.host.list_sessions(
                        &self.config.fleet_alias,
                        self.config.page_size,
                        token.as_deref(),
                    )
                },
            )
            .await?;
            pages += 1;
            sessions.extend(page.sessions);

            for skipped in &page.unreadable {
                warn!(
                    name = skipped.name.as_deref().unwrap_or("-"),
                    game_session_id = skipped.game_session_id.as_deref().unwrap_or("-"),
                    reason = %skipped.reason,
                    "Skipping unreadable hosted session"
                );
            }
            unreadable += page.unreadable.len();

            if let Some(pause) = pacer.page_fetched(page.next.is_some()) {
                debug!(pages, pause_ms = pause.as_millis() as u64, "Pausing session listing");
                tokio::time::sleep(pause).await;
            }

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(pages, sessions = sessions.len(), unreadable, "Listed hosted sessions");
        Ok((sessions, unreadable))
    }
}
