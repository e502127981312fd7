//! Records exchanged between the registry, the session host and the
//! configuration store.
//!
//! JSON forms keep the PascalCase attribute names that clients of the world
//! listing and join endpoints already consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use worldfleet_id::{GameSessionId, Location, PlayerId, PlayerSessionId, WorldId, WorldKey};
use worldfleet_reconcile::SessionStatus;

/// Desired state of one world. Owned by operators; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldConfig {
    pub location: Location,

    /// Base world id; dynamic instances are named after it.
    #[serde(rename = "WorldID")]
    pub world_id: WorldId,

    /// Player capacity of one instance.
    pub max_players: i32,

    pub world_map: String,

    /// Scale instance count with demand instead of running exactly one.
    #[serde(default, deserialize_with = "flag")]
    pub dynamic_world: bool,

    /// Stop maintaining this world.
    #[serde(default, deserialize_with = "flag")]
    pub terminate_session: bool,
}

impl WorldConfig {
    pub fn key(&self) -> WorldKey {
        WorldKey::new(self.location.clone(), self.world_id.clone())
    }
}

/// Tracked record of one running or recently running world instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldSession {
    pub location: Location,

    /// Instance name: the base world id, or a timestamp-suffixed dynamic instance.
    #[serde(rename = "WorldID")]
    pub world_id: WorldId,

    pub status: SessionStatus,

    pub creation_time: DateTime<Utc>,

    /// Last time a pass saw this session on the host. `None` until the first sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_time: Option<DateTime<Utc>>,

    /// Advisory player count. `None` until the first sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player_session_count: Option<i32>,

    pub max_players: i32,

    pub world_map: String,

    #[serde(default)]
    pub dynamic_world: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_session_id: Option<GameSessionId>,
}

impl WorldSession {
    /// A freshly deployed session as recorded right after host creation.
    pub fn provisioning(config: &WorldConfig, world_id: WorldId, now: DateTime<Utc>) -> Self {
        Self {
            location: config.location.clone(),
            world_id,
            status: SessionStatus::Provisioning,
            creation_time: now,
            last_updated_time: None,
            current_player_session_count: None,
            max_players: config.max_players,
            world_map: config.world_map.clone(),
            dynamic_world: config.dynamic_world,
            game_session_id: None,
        }
    }

    pub fn key(&self) -> WorldKey {
        WorldKey::new(self.location.clone(), self.world_id.clone())
    }
}

/// A session as reported by the host during one pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedSession {
    pub location: Location,

    /// Name given at creation; equals the registry world id.
    #[serde(rename = "Name")]
    pub instance_name: WorldId,

    pub status: SessionStatus,

    pub game_session_id: GameSessionId,

    #[serde(default)]
    pub current_player_session_count: i32,

    pub creation_time: DateTime<Utc>,
}

impl HostedSession {
    pub fn key(&self) -> WorldKey {
        WorldKey::new(self.location.clone(), self.instance_name.clone())
    }

    /// Read one entry of a host listing.
    ///
    /// The fleet may run sessions this service never started, so a bad entry
    /// is handed back for the caller to skip instead of failing the listing.
    pub fn from_listing(raw: serde_json::Value) -> Result<Self, UnreadableSession> {
        let text = |field: &str| raw.get(field).and_then(|v| v.as_str()).map(str::to_string);
        let name = text("Name");
        let game_session_id = text("GameSessionId");

        serde_json::from_value(raw).map_err(|e| UnreadableSession {
            name,
            game_session_id,
            reason: e.to_string(),
        })
    }
}

/// A host listing entry that is not a valid [`HostedSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableSession {
    pub name: Option<String>,
    pub game_session_id: Option<String>,
    pub reason: String,
}

/// Fields refreshed on a registry record from an observed host session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: SessionStatus,
    pub game_session_id: GameSessionId,
    pub current_player_session_count: i32,
    pub last_updated_time: DateTime<Utc>,
}

impl SessionUpdate {
    pub fn observed(session: &HostedSession, now: DateTime<Utc>) -> Self {
        Self {
            status: session.status,
            game_session_id: session.game_session_id.clone(),
            current_player_session_count: session.current_player_session_count,
            last_updated_time: now,
        }
    }
}

/// A player slot reserved by the host inside a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    pub player_session_id: PlayerSessionId,
    pub player_id: PlayerId,
    pub game_session_id: GameSessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub creation_time: DateTime<Utc>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C = WorldKey> {
    pub items: Vec<T>,

    /// Cursor for the next page; `None` on the last page.
    pub next: Option<C>,
}

/// Accepts a JSON boolean or the "YES"/"NO" strings of hand-authored configs.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.to_ascii_uppercase().as_str() {
            "YES" | "TRUE" => Ok(true),
            "NO" | "FALSE" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected YES or NO, got {other}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_config_accepts_yes_no_flags() {
        let json = serde_json::json!({
            "Location": "us-east-1",
            "WorldID": "forest",
            "MaxPlayers": 20,
            "WorldMap": "forest_map",
            "DynamicWorld": "YES",
        });

        let config: WorldConfig = serde_json::from_value(json).unwrap();
        assert!(config.dynamic_world);
        assert!(!config.terminate_session);
    }

    #[test]
    fn test_world_config_rejects_unknown_flag() {
        let json = serde_json::json!({
            "Location": "us-east-1",
            "WorldID": "forest",
            "MaxPlayers": 20,
            "WorldMap": "forest_map",
            "TerminateSession": "MAYBE",
        });

        assert!(serde_json::from_value::<WorldConfig>(json).is_err());
    }

    #[test]
    fn test_listing_entry_with_foreign_name_is_unreadable() {
        let raw = serde_json::json!({
            "Location": "us-east-1",
            "Name": "manual session",
            "Status": "ACTIVE",
            "GameSessionId": "gsess-7",
            "CreationTime": "2026-06-01T12:00:00Z",
        });

        let unreadable = HostedSession::from_listing(raw).unwrap_err();
        assert_eq!(unreadable.name.as_deref(), Some("manual session"));
        assert_eq!(unreadable.game_session_id.as_deref(), Some("gsess-7"));
    }

    #[test]
    fn test_listing_entry_with_unknown_status_is_unreadable() {
        let raw = serde_json::json!({
            "Location": "us-east-1",
            "Name": "castle",
            "Status": "HIBERNATING",
            "GameSessionId": "gsess-8",
            "CreationTime": "2026-06-01T12:00:00Z",
        });

        assert!(HostedSession::from_listing(raw).is_err());
    }

    #[test]
    fn test_world_session_json_omits_unsynced_fields() {
        let config = WorldConfig {
            location: Location::parse("us-east-1").unwrap(),
            world_id: WorldId::parse("castle").unwrap(),
            max_players: 50,
            world_map: "castle_map".to_string(),
            dynamic_world: false,
            terminate_session: false,
        };
        let session = WorldSession::provisioning(&config, config.world_id.clone(), Utc::now());

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["WorldID"], "castle");
        assert_eq!(json["Status"], "PROVISIONING");
        assert!(json.get("CurrentPlayerSessionCount").is_none());
        assert!(json.get("GameSessionId").is_none());
    }
}
