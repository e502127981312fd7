//! World session registry.
//!
//! The registry persists one [`WorldSession`] per (location, world id). The
//! controller writes it during reconciliation; admission only ever touches the
//! player counter, through [`Registry::increment_player_count`].

mod memory;
mod postgres;

pub use memory::MemoryRegistry;
pub use postgres::PgRegistry;

use async_trait::async_trait;
use thiserror::Error;
use worldfleet_id::{Location, WorldKey};
use worldfleet_reconcile::SessionStatus;

use crate::models::{Page, SessionUpdate, WorldSession};

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by registry backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// A stored row could not be turned back into a record.
    #[error("corrupt registry record {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Typed access to the world session table.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch one record.
    async fn get(&self, key: &WorldKey) -> RegistryResult<Option<WorldSession>>;

    /// Write a whole record, replacing any existing one under the same key.
    async fn put(&self, session: &WorldSession) -> RegistryResult<()>;

    /// Refresh the observed fields of an existing record.
    ///
    /// Returns `false` when no record exists under `key`; nothing is created.
    async fn update_observed(&self, key: &WorldKey, update: &SessionUpdate)
        -> RegistryResult<bool>;

    /// Atomically add `delta` to the player counter of a synced record.
    ///
    /// Returns `false` when the record is missing or has no counter yet.
    async fn increment_player_count(&self, key: &WorldKey, delta: i32) -> RegistryResult<bool>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete(&self, key: &WorldKey) -> RegistryResult<bool>;

    /// Scan all records in key order, `limit` at a time, starting after `after`.
    async fn scan(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> RegistryResult<Page<WorldSession>>;

    /// Records in one location, optionally filtered by status.
    async fn query_location(
        &self,
        location: &Location,
        status: Option<SessionStatus>,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> RegistryResult<Page<WorldSession>>;

    /// Check the backend is reachable.
    async fn health_check(&self) -> RegistryResult<()> {
        Ok(())
    }
}

/// Drain a full scan of the registry.
pub async fn scan_all(registry: &dyn Registry, page_size: u32) -> RegistryResult<Vec<WorldSession>> {
    let mut sessions = Vec::new();
    let mut after: Option<WorldKey> = None;

    loop {
        let page = registry.scan(after.as_ref(), page_size).await?;
        sessions.extend(page.items);
        match page.next {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    Ok(sessions)
}

/// Cursor for the page that follows `items` when it came back full.
fn next_cursor(items: &[WorldSession], limit: u32) -> Option<WorldKey> {
    if limit == 0 || items.len() < limit as usize {
        return None;
    }
    items.last().map(WorldSession::key)
}
