//! Postgres-backed registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use worldfleet_id::{GameSessionId, Location, WorldId, WorldKey};
use worldfleet_reconcile::SessionStatus;

use super::{next_cursor, Registry, RegistryError, RegistryResult};
use crate::models::{Page, SessionUpdate, WorldSession};

const SESSION_COLUMNS: &str = "location, world_id, status, creation_time, last_updated_time, \
     current_player_session_count, max_players, world_map, dynamic_world, game_session_id";

/// Registry stored in the `world_sessions` table.
#[derive(Clone)]
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Registry for PgRegistry {
    async fn get(&self, key: &WorldKey) -> RegistryResult<Option<WorldSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM world_sessions WHERE location = $1 AND world_id = $2"
        ))
        .bind(key.location.as_str())
        .bind(key.world_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    async fn put(&self, session: &WorldSession) -> RegistryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO world_sessions (
                location, world_id, status, creation_time, last_updated_time,
                current_player_session_count, max_players, world_map, dynamic_world,
                game_session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (location, world_id) DO UPDATE SET
                status = EXCLUDED.status,
                creation_time = EXCLUDED.creation_time,
                last_updated_time = EXCLUDED.last_updated_time,
                current_player_session_count = EXCLUDED.current_player_session_count,
                max_players = EXCLUDED.max_players,
                world_map = EXCLUDED.world_map,
                dynamic_world = EXCLUDED.dynamic_world,
                game_session_id = EXCLUDED.game_session_id
            "#,
        )
        .bind(session.location.as_str())
        .bind(session.world_id.as_str())
        .bind(session.status.as_str())
        .bind(session.creation_time)
        .bind(session.last_updated_time)
        .bind(session.current_player_session_count)
        .bind(session.max_players)
        .bind(&session.world_map)
        .bind(session.dynamic_world)
        .bind(session.game_session_id.as_ref().map(GameSessionId::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_observed(
        &self,
        key: &WorldKey,
        update: &SessionUpdate,
    ) -> RegistryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE world_sessions
            SET status = $3,
                game_session_id = $4,
                current_player_session_count = $5,
                last_updated_time = $6
            WHERE location = $1 AND world_id = $2
            "#,
        )
        .bind(key.location.as_str())
        .bind(key.world_id.as_str())
        .bind(update.status.as_str())
        .bind(update.game_session_id.as_str())
        .bind(update.current_player_session_count)
        .bind(update.last_updated_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_player_count(&self, key: &WorldKey, delta: i32) -> RegistryResult<bool> {
        // Single-statement add; the row lock serializes concurrent admissions.
        let result = sqlx::query(
            r#"
            UPDATE world_sessions
            SET current_player_session_count = current_player_session_count + $3
            WHERE location = $1 AND world_id = $2
              AND current_player_session_count IS NOT NULL
            "#,
        )
        .bind(key.location.as_str())
        .bind(key.world_id.as_str())
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, key: &WorldKey) -> RegistryResult<bool> {
        let result = sqlx::query("DELETE FROM world_sessions WHERE location = $1 AND world_id = $2")
            .bind(key.location.as_str())
            .bind(key.world_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(
        &self,
        after: Option<&WorldKey>,
        limit: u32,
    ) -> RegistryResult<Page<WorldSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM world_sessions
            WHERE $1::TEXT IS NULL OR (location, world_id) > ($1, $2)
            ORDER BY location, world_id
            LIMIT $3
            "#
        ))
        .bind(after.map(|k| k.location.as_str()))
        .bind(after.map(|k| k.world_id.as_str()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(SessionRow::into_session)
            .collect::<RegistryResult<Vec<_>>>()?;
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
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM world_sessions
            WHERE location = $1
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR world_id > $3)
            ORDER BY world_id
            LIMIT $4
            "#
        ))
        .bind(location.as_str())
        .bind(status.map(|s| s.as_str()))
        .bind(after.map(|k| k.world_id.as_str()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(SessionRow::into_session)
            .collect::<RegistryResult<Vec<_>>>()?;
        let next = next_cursor(&items, limit);
        Ok(Page { items, next })
    }

    async fn health_check(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug)]
struct SessionRow {
    location: String,
    world_id: String,
    status: String,
    creation_time: DateTime<Utc>,
    last_updated_time: Option<DateTime<Utc>>,
    current_player_session_count: Option<i32>,
    max_players: i32,
    world_map: String,
    dynamic_world: bool,
    game_session_id: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SessionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            location: row.try_get("location")?,
            world_id: row.try_get("world_id")?,
            status: row.try_get("status")?,
            creation_time: row.try_get("creation_time")?,
            last_updated_time: row.try_get("last_updated_time")?,
            current_player_session_count: row.try_get("current_player_session_count")?,
            max_players: row.try_get("max_players")?,
            world_map: row.try_get("world_map")?,
            dynamic_world: row.try_get("dynamic_world")?,
            game_session_id: row.try_get("game_session_id")?,
        })
    }
}

impl SessionRow {
    fn into_session(self) -> RegistryResult<WorldSession> {
        let key = format!("{}:{}", self.location, self.world_id);
        let corrupt = |message: String| RegistryError::Corrupt {
            key: key.clone(),
            message,
        };

        Ok(WorldSession {
            location: Location::parse(&self.location).map_err(|e| corrupt(e.to_string()))?,
            world_id: WorldId::parse(&self.world_id).map_err(|e| corrupt(e.to_string()))?,
            status: self.status.parse().map_err(|e: worldfleet_reconcile::ReconcileError| {
                corrupt(e.to_string())
            })?,
            creation_time: self.creation_time,
            last_updated_time: self.last_updated_time,
            current_player_session_count: self.current_player_session_count,
            max_players: self.max_players,
            world_map: self.world_map,
            dynamic_world: self.dynamic_world,
            game_session_id: self
                .game_session_id
                .as_deref()
                .map(GameSessionId::parse)
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
        })
    }
}
