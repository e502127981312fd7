//! Identifier definitions for fleet resources.
//!
//! Operator-chosen names (locations, world ids) and host-assigned ids
//! (game sessions, player sessions) share the same validation rules.

use chrono::{DateTime, Utc};

use crate::define_name;

// =============================================================================
// Placement
// =============================================================================

define_name!(Location, "location");

// =============================================================================
// Worlds and Sessions
// =============================================================================

define_name!(WorldId, "world id");
define_name!(GameSessionId, "game session id");

// =============================================================================
// Players
// =============================================================================

define_name!(PlayerId, "player id");
define_name!(PlayerSessionId, "player session id");

/// Timestamp suffix format appended to dynamic world instances.
pub const DYNAMIC_SUFFIX_FORMAT: &str = "%Y%m%d_%H%M%S";

impl WorldId {
    /// Returns true if this world id belongs to the given base world.
    ///
    /// Association is by plain name prefix, so a base id must never be a
    /// prefix of another base id (`forest` and `forest2` would collide).
    #[must_use]
    pub fn has_base(&self, base: &WorldId) -> bool {
        self.0.starts_with(base.as_str())
    }

    /// Builds the instance name for a new dynamic instance of `base`.
    ///
    /// The name is `{base}_{YYYYMMDD_HHMMSS}` in UTC, so two instances
    /// deployed within the same second share a name.
    pub fn dynamic_instance(base: &WorldId, at: DateTime<Utc>) -> Result<Self, crate::NameError> {
        Self::parse(&format!(
            "{}_{}",
            base.as_str(),
            at.format(DYNAMIC_SUFFIX_FORMAT)
        ))
    }
}

/// Registry key of a world session: one record per (location, world id).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct WorldKey {
    pub location: Location,
    pub world_id: WorldId,
}

impl WorldKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(location: Location, world_id: WorldId) -> Self {
        Self { location, world_id }
    }
}

impl std::fmt::Display for WorldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.location, self.world_id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_location_parse() {
        let location: Location = "us-east-1".parse().unwrap();
        assert_eq!(location.as_str(), "us-east-1");
        assert_eq!(location.to_string(), "us-east-1");
    }

    #[test]
    fn test_empty_rejected() {
        let result: Result<WorldId, _> = "".parse();
        assert!(matches!(result, Err(crate::NameError::Empty { .. })));
    }

    #[test]
    fn test_whitespace_rejected() {
        let result: Result<PlayerId, _> = "player one".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::NameError::InvalidCharacter { found: ' ', .. }
        ));
    }

    #[test]
    fn test_too_long_rejected() {
        let long = "a".repeat(crate::MAX_NAME_LEN + 1);
        let result = GameSessionId::parse(&long);
        assert!(matches!(result, Err(crate::NameError::TooLong { .. })));
    }

    #[test]
    fn test_json_rejects_invalid() {
        let result: Result<Location, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());

        let location: Location = serde_json::from_str("\"eu-west-1\"").unwrap();
        assert_eq!(location.as_str(), "eu-west-1");
    }

    #[test]
    fn test_dynamic_instance_name() {
        let base = WorldId::parse("forest").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let instance = WorldId::dynamic_instance(&base, at).unwrap();
        assert_eq!(instance.as_str(), "forest_20260304_050607");
        assert!(instance.has_base(&base));
    }

    #[test]
    fn test_prefix_association_is_plain_prefix() {
        let forest = WorldId::parse("forest").unwrap();
        let forest2 = WorldId::parse("forest2_20260101_000000").unwrap();
        // Documented hazard: a base id that prefixes another claims its instances.
        assert!(forest2.has_base(&forest));

        let desert = WorldId::parse("desert").unwrap();
        assert!(!forest2.has_base(&desert));
    }

    #[test]
    fn test_world_key_display() {
        let key = WorldKey::new(
            Location::parse("us-west-2").unwrap(),
            WorldId::parse("castle").unwrap(),
        );
        assert_eq!(key.to_string(), "us-west-2:castle");
    }

    proptest! {
        #[test]
        fn prop_valid_names_parse(s in "[A-Za-z0-9_.:-]{1,64}") {
            let id = WorldId::parse(&s).unwrap();
            prop_assert_eq!(id.as_str(), s.as_str());
        }
    }
}
