//! Identifier and version newtypes used across the ledger.
//!
//! All identifiers originate outside this crate: speaker and session ids come
//! from the conference content source, user ids from the identity provider.
//! They are opaque strings here; the newtypes exist for type safety and clear
//! intent in function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert the identifier into its inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a speaker in the conference content data.
    ///
    /// Resolved from the actor's identity claims by the auth collaborator
    /// before any command handler runs; never taken from client input.
    SpeakerId
}

string_id! {
    /// Identifier of a conference session.
    SessionId
}

string_id! {
    /// Identifier of an authenticated user (attendee or admin).
    UserId
}

/// Position of a ledger for optimistic concurrency control.
///
/// A ledger at version `n` contains exactly `n` events. When appending, the
/// caller states the version it validated against; if another command has
/// appended in the meantime the store rejects the write and the caller
/// re-reads, re-validates, and retries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of an empty ledger.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Check if this is the initial version (empty ledger).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_id_roundtrip() {
        let id = SpeakerId::new("sp-123");
        assert_eq!(id.as_str(), "sp-123");
        assert_eq!(format!("{id}"), "sp-123");
        assert_eq!(id.into_inner(), "sp-123");
    }

    #[test]
    fn ids_are_distinct_types() {
        let speaker = SpeakerId::from("x");
        let session = SessionId::from("x");
        assert_eq!(speaker.as_str(), session.as_str());
    }

    #[test]
    fn version_progression() {
        assert!(Version::INITIAL.is_initial());
        assert_eq!(Version::INITIAL.next(), Version::new(1));
        assert_eq!(Version::new(41).next().value(), 42);
        assert!(Version::new(1) < Version::new(2));
    }
}
