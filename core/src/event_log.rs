//! Append-only event log abstraction.
//!
//! A ledger is an ordered, append-only sequence of domain events. The store
//! assigns each event a contiguous 1-based sequence number and a timestamp;
//! replay order is ascending sequence. There is no update and no delete.
//!
//! # Concurrency
//!
//! Appends take an optional expected version (the ledger length the caller
//! validated against). If the ledger has grown in the meantime the append is
//! rejected with [`StoreError::ConcurrencyConflict`] and the caller re-reads
//! and re-validates. This is what keeps validate-then-append invariants (the
//! two-assignment cap, the session assignee cap) correct under concurrent
//! commands: two racing writers cannot both commit against the same version.
//!
//! # Implementations
//!
//! - `InMemoryEventLog` (in `s2s-testing`): deterministic, for tests
//! - `PostgresEventLog` (in `s2s-postgres`): durable, one table per ledger
//!
//! # Dyn compatibility
//!
//! The trait returns explicit `Pin<Box<dyn Future>>` instead of `async fn`
//! so command handlers can hold `Arc<dyn EventLog<E>>`.

use crate::event::Event;
use crate::event::Recorded;
use crate::ids::Version;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event log operations.
///
/// These are infrastructure errors, distinct from domain rejections: they
/// are propagated to the caller, never converted into user-facing
/// validation messages.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The ledger changed between read and append.
    ///
    /// Expected under concurrent commands; callers re-read and retry.
    #[error("Concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The version the caller validated against.
        expected: Version,
        /// The ledger's actual current version.
        actual: Version,
    },

    /// Storage backend failure (connection, query).
    #[error("Backend error: {0}")]
    Backend(String),

    /// Event payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// An append-only, totally ordered log of domain events.
///
/// One instance represents one ledger (the speaker ledger, the
/// attendee-feedback ledger, the bookmark ledger). Implementations must be
/// `Send + Sync` and must guarantee:
///
/// - appends are atomic for the whole batch (all events or none),
/// - sequences are contiguous and assigned in commit order,
/// - `read_all` returns events ascending by sequence.
pub trait EventLog<E: Event>: Send + Sync {
    /// Append a batch of events to the ledger.
    ///
    /// `expected_version: Some(v)` asserts the ledger currently holds
    /// exactly `v` events; `None` appends unconditionally (used by commands
    /// whose invariants do not depend on prior state, like attendee
    /// ratings).
    ///
    /// Returns the new version after the append.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ConcurrencyConflict`] on version mismatch
    /// - [`StoreError::Backend`] / [`StoreError::Serialization`] on
    ///   infrastructure failure
    fn append(
        &self,
        expected_version: Option<Version>,
        events: Vec<E>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>>;

    /// Read the full ledger, ascending by sequence.
    ///
    /// An empty ledger yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] or [`StoreError::Serialization`] on
    /// infrastructure failure.
    fn read_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Recorded<E>>, StoreError>> + Send + '_>>;
}

/// The version of a fully-read ledger: its length.
#[must_use]
pub fn version_of<E>(events: &[Recorded<E>]) -> Version {
    Version::new(events.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_display() {
        let error = StoreError::ConcurrencyConflict {
            expected: Version::new(5),
            actual: Version::new(7),
        };
        let display = format!("{error}");
        assert!(display.contains("expected version 5"));
        assert!(display.contains("found 7"));
    }

    #[test]
    fn version_of_counts_events() {
        let events: Vec<Recorded<crate::event::BookmarkEvent>> = Vec::new();
        assert!(version_of(&events).is_initial());
    }
}
