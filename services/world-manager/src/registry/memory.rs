//! In-process registry used in dev mode and tests.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use worldfleet_id::{Location, WorldKey};
use worldfleet_reconcile::SessionStatus;

use super::{next_cursor, Registry, RegistryError, RegistryResult};
use crate::models::{Page, SessionUpdate, WorldSession};

/// Registry backed by an ordered map.
#[derive(Default)]
pub struct MemoryRegistry {
    records: RwLock<BTreeMap<WorldKey, WorldSession>>,

    /// When set, every `put` fails.
    fail_puts: AtomicBool,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with records.
    pub fn with_sessions(sessions: impl IntoIterator<Item = WorldSession>) -> Self {
        let records = sessions.into_iter().map(|s| (s.key(), s)).collect();
        Self {
            records: RwLock::new(records),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Make subsequent `put` calls fail (or succeed again).
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every record, in key order.
    pub async fn snapshot(&self) -> Vec<WorldSession> {
        self.records.read().await.values().cloned().collect()
    }

    fn page_after<'a>(
        records: &'a BTreeMap<WorldKey, WorldSession>,
        after: Option<&WorldKey>,
    ) -> impl Iterator<Item = &'a WorldSession> {
        let lower = match after {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        records.range((lower, Bound::Unbounded)).map(|(_, v)| v)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(&self, key: &WorldKey) -> RegistryResult<Option<WorldSession>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, session: &WorldSession) -> RegistryResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable(format!(
                "put rejected for {}",
                session.key()
            )));
        }
        self.records
            .write()
            .await
            .insert(session.key(), session.clone());
        Ok(())
    }

    async fn update_observed(
        &self,
        key: &WorldKey,
        update: &SessionUpdate,
    ) -> RegistryResult<bool> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(key) else {
            return Ok(false);
        };
        record.status = update.status;
        record.game_session_id = Some(update.game_session_id.clone());
        record.current_player_session_count = Some(update.current_player_session_count);
        record.last_updated_time = Some(update.last_updated_time);
        Ok(true)
    }

    async fn increment_player_count(&self, key: &WorldKey, delta: i32) -> RegistryResult<bool> {
        // Read and add under one write guard so concurrent callers serialize.
        let mut records = self.records.write().await;
        match records
            .get_mut(key)
            .and_then(|r| r.current_player_session_count.as_mut())
        {
            Some(count) => {
                *count = count.saturating_add(delta);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &WorldKey) -> RegistryResult<bool> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn scan(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> RegistryResult<Page<WorldSession>> {
        let records = self.records.read().await;
        let items: Vec<_> = Self::page_after(&records, after)
            .take(limit as usize)
            .cloned()
            .collect();
        let next = next_cursor(&items, limit);
        Ok(Page { items, next })
    }

    async fn query_location(
        &self,
        location: &Location,
        status: Option<SessionStatus>,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> RegistryResult<Page<WorldSession>> {
        let records = self.records.read().await;
        let items: Vec<_> = Self::page_after(&records, after)
            .filter(|s| &s.location == location)
            .filter(|s| status.is_none_or(|st| s.status == st))
            .take(limit as usize)
            .cloned()
            .collect();
        let next = next_cursor(&items, limit);
        Ok(Page { items, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::scan_all;
    use chrono::Utc;
    use worldfleet_id::WorldId;

    fn session(location: &str, world: &str, status: SessionStatus) -> WorldSession {
        WorldSession {
            location: Location::parse(location).unwrap(),
            world_id: WorldId::parse(world).unwrap(),
            status,
            creation_time: Utc::now(),
            last_updated_time: None,
            current_player_session_count: None,
            max_players: 10,
            world_map: "map".to_string(),
            dynamic_world: false,
            game_session_id: None,
        }
    }

    #[tokio::test]
    async fn test_scan_paginates_in_key_order() {
        let registry = MemoryRegistry::with_sessions(
            (0..7).map(|i| session("us-east-1", &format!("world{i}"), SessionStatus::Active)),
        );

        let first = registry.scan(None, 3).await.unwrap();
        assert_eq!(first.items.len(), 3);
        assert!(first.next.is_some());

        let all = scan_all(&registry, 3).await.unwrap();
        assert_eq!(all.len(), 7);
        let names: Vec<_> = all.iter().map(|s| s.world_id.to_string()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_query_location_filters_status() {
        let registry = MemoryRegistry::with_sessions([
            session("us-east-1", "a", SessionStatus::Active),
            session("us-east-1", "b", SessionStatus::Provisioning),
            session("eu-west-1", "c", SessionStatus::Active),
        ]);

        let location = Location::parse("us-east-1").unwrap();
        let page = registry
            .query_location(&location, Some(SessionStatus::Active), None, 100)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].world_id.as_str(), "a");
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_update_observed_does_not_create() {
        let registry = MemoryRegistry::new();
        let s = session("us-east-1", "ghost", SessionStatus::Active);
        let update = SessionUpdate {
            status: SessionStatus::Active,
            game_session_id: "gs-1".parse().unwrap(),
            current_player_session_count: 3,
            last_updated_time: Utc::now(),
        };

        assert!(!registry.update_observed(&s.key(), &update).await.unwrap());
        assert!(registry.get(&s.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_requires_synced_counter() {
        let mut s = session("us-east-1", "castle", SessionStatus::Active);
        let registry = MemoryRegistry::with_sessions([s.clone()]);
        assert!(!registry.increment_player_count(&s.key(), 1).await.unwrap());

        s.current_player_session_count = Some(4);
        registry.put(&s).await.unwrap();
        assert!(registry.increment_player_count(&s.key(), 1).await.unwrap());

        let stored = registry.get(&s.key()).await.unwrap().unwrap();
        assert_eq!(stored.current_player_session_count, Some(5));
    }

    #[tokio::test]
    async fn test_fail_puts() {
        let registry = MemoryRegistry::new();
        registry.set_fail_puts(true);
        let s = session("us-east-1", "castle", SessionStatus::Provisioning);
        assert!(matches!(
            registry.put(&s).await,
            Err(RegistryError::Unavailable(_))
        ));
    }
}
