//! # worldfleet-id
//!
//! Identifier types for the world fleet.
//!
//! ## Design Principles
//!
//! - Identifiers are opaque names chosen by operators (locations, world ids)
//!   or assigned by the session host (game session ids, player session ids)
//! - All identifiers are validated once at the boundary and are cheap to clone
//! - Identifiers are typed to prevent mixing a location with a world id
//!
//! ## Examples
//!
//! - Location: `us-east-1`
//! - World: `forest`, or a dynamic instance `forest_20260101_120000`
//! - Game session: `gsess-7a3c...` (host assigned)

mod error;
mod macros;
mod types;

pub use error::NameError;
pub use types::*;

/// Maximum length in bytes of any identifier.
pub const MAX_NAME_LEN: usize = 256;
