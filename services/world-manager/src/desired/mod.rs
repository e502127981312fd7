//! Desired-state world configuration.
//!
//! Configurations are authored outside this service. The controller only
//! ever scans them.

mod memory;
mod postgres;

pub use memory::MemoryConfigProvider;
pub use postgres::PgConfigProvider;

use async_trait::async_trait;
use thiserror::Error;
use worldfleet_id::WorldKey;

use crate::models::{Page, WorldConfig};

/// Errors returned by configuration sources.
#[derive(Debug, Error)]
pub enum ConfigSourceError {
    #[error("config query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("invalid world config {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Read-only access to world configurations.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Scan configurations in key order, `limit` at a time, starting after `after`.
    async fn scan_configs(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> Result<Page<WorldConfig>, ConfigSourceError>;
}

/// Drain a full scan of the configuration source.
pub async fn scan_all_configs(
    provider: &dyn ConfigProvider,
    page_size: u32,
) -> Result<Vec<WorldConfig>, ConfigSourceError> {
    let mut configs = Vec::new();
    let mut after: Option<WorldKey> = None;

    loop {
        let page = provider.scan_configs(after.as_ref(), page_size).await?;
        configs.extend(page.items);
        match page.next {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    Ok(configs)
}

fn next_cursor(items: &[WorldConfig], limit: u32) -> Option<WorldKey> {
    if limit == 0 || items.len() < limit as usize {
        return None;
    }
    items.last().map(WorldConfig::key)
}
