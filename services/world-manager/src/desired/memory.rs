//! Fixed configuration set for dev mode and tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use tokio::sync::RwLock;
use worldfleet_id::WorldKey;

use super::{next_cursor, ConfigProvider, ConfigSourceError};
use crate::models::{Page, WorldConfig};

/// Configuration source backed by an ordered map.
#[derive(Default)]
pub struct MemoryConfigProvider {
    configs: RwLock<BTreeMap<WorldKey, WorldConfig>>,
}

impl MemoryConfigProvider {
    pub fn new(configs: impl IntoIterator<Item = WorldConfig>) -> Self {
        Self {
            configs: RwLock::new(configs.into_iter().map(|c| (c.key(), c)).collect()),
        }
    }

    /// Replace or add a configuration, as an operator edit would.
    pub async fn upsert(&self, config: WorldConfig) {
        self.configs.write().await.insert(config.key(), config);
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn scan_configs(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> Result<Page<WorldConfig>, ConfigSourceError> {
        let configs = self.configs.read().await;
        let lower = match after {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let items: Vec<_> = configs
            .range((lower, Bound::Unbounded))
            .map(|(_, c)| c.clone())
            .take(limit as usize)
            .collect();
        let next = next_cursor(&items, limit);
        Ok(Page { items, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desired::scan_all_configs;

    fn config(world: &str) -> WorldConfig {
        WorldConfig {
            location: "us-east-1".parse().unwrap(),
            world_id: world.parse().unwrap(),
            max_players: 10,
            world_map: "map".to_string(),
            dynamic_world: false,
            terminate_session: false,
        }
    }

    #[tokio::test]
    async fn test_scan_all_across_pages() {
        let provider = MemoryConfigProvider::new((0..5).map(|i| config(&format!("w{i}"))));
        let all = scan_all_configs(&provider, 2).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let provider = MemoryConfigProvider::new([config("castle")]);
        let mut edited = config("castle");
        edited.terminate_session = true;
        provider.upsert(edited).await;

        let all = scan_all_configs(&provider, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].terminate_session);
    }
}
