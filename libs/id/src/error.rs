//! Error types for identifier validation.

use thiserror::Error;

/// Errors that can occur when validating an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The identifier string is empty.
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    /// The identifier exceeds the maximum length.
    #[error("{kind} exceeds {max} bytes (got {actual})")]
    TooLong {
        kind: &'static str,
        max: usize,
        actual: usize,
    },

    /// The identifier contains whitespace or a control character.
    #[error("{kind} contains invalid character {found:?}")]
    InvalidCharacter { kind: &'static str, found: char },
}

impl NameError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, NameError::Empty { .. })
    }
}
