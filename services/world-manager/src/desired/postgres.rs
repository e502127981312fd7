//! World configurations stored in the `world_configs` table.

use async_trait::async_trait;
use sqlx::PgPool;
use worldfleet_id::{Location, WorldId, WorldKey};

use super::{next_cursor, ConfigProvider, ConfigSourceError};
use crate::models::{Page, WorldConfig};

#[derive(Clone)]
pub struct PgConfigProvider {
    pool: PgPool,
}

impl PgConfigProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigProvider for PgConfigProvider {
    async fn scan_configs(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> Result<Page<WorldConfig>, ConfigSourceError> {
        let rows = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT location, world_id, max_players, world_map, dynamic_world, terminate_session
            FROM world_configs
            WHERE $1::TEXT IS NULL OR (location, world_id) > ($1, $2)
            ORDER BY location, world_id
            LIMIT $3
            "#,
        )
        .bind(after.map(|k| k.location.as_str()))
        .bind(after.map(|k| k.world_id.as_str()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ConfigRow::into_config)
            .collect::<Result<Vec<_>, _>>()?;
        let next = next_cursor(&items, limit);
        Ok(Page { items, next })
    }
}

#[derive(Debug)]
struct ConfigRow {
    location: String,
    world_id: String,
    max_players: i32,
    world_map: String,
    dynamic_world: bool,
    terminate_session: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ConfigRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            location: row.try_get("location")?,
            world_id: row.try_get("world_id")?,
            max_players: row.try_get("max_players")?,
            world_map: row.try_get("world_map")?,
            dynamic_world: row.try_get("dynamic_world")?,
            terminate_session: row.try_get("terminate_session")?,
        })
    }
}

impl ConfigRow {
    fn into_config(self) -> Result<WorldConfig, ConfigSourceError> {
        let invalid = |message: String| ConfigSourceError::Invalid {
            key: format!("{}:{}", self.location, self.world_id),
            message,
        };

        Ok(WorldConfig {
            location: Location::parse(&self.location).map_err(|e| invalid(e.to_string()))?,
            world_id: WorldId::parse(&self.world_id).map_err(|e| invalid(e.to_string()))?,
            max_players: self.max_players,
            world_map: self.world_map.clone(),
            dynamic_world: self.dynamic_world,
            terminate_session: self.terminate_session,
        })
    }
}
