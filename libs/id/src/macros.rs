//! Macros for defining validated identifier types.

/// Macro to define a validated string identifier.
///
/// This generates a newtype wrapper around `String` with:
/// - A `KIND` constant used in error messages
/// - `parse()` to validate and build from a string
/// - `as_str()` to borrow the raw value
/// - `Display`, `FromStr`, `AsRef<str>` implementations
/// - `Serialize` and `Deserialize` implementations (validated on input)
///
/// # Example
///
/// ```ignore
/// define_name!(Location, "location");
///
/// let location: Location = "us-east-1".parse()?;
/// ```
#[macro_export]
macro_rules! define_name {
    ($name:ident, $kind:literal) => {
        /// A validated identifier.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Human readable name of this identifier kind.
            pub const KIND: &'static str = $kind;

            /// Validates and wraps an identifier.
            ///
            /// The value must be non-empty, at most
            /// [`MAX_NAME_LEN`](crate::MAX_NAME_LEN) bytes and free of
            /// whitespace and control characters.
            pub fn parse(s: &str) -> Result<Self, $crate::NameError> {
                if s.is_empty() {
                    return Err($crate::NameError::Empty { kind: Self::KIND });
                }

                if s.len() > $crate::MAX_NAME_LEN {
                    return Err($crate::NameError::TooLong {
                        kind: Self::KIND,
                        max: $crate::MAX_NAME_LEN,
                        actual: s.len(),
                    });
                }

                if let Some(found) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
                    return Err($crate::NameError::InvalidCharacter {
                        kind: Self::KIND,
                        found,
                    });
                }

                Ok(Self(s.to_string()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::NameError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
