//! Deterministic test doubles for the speaker-to-speaker ledgers.
//!
//! Provides:
//! - [`InMemoryEventLog`]: a lock-protected, fully in-process event log with
//!   the same version semantics as the Postgres store
//! - [`FixedClock`]: deterministic time
//! - [`StaticContent`]: a canned conference schedule
//! - session fixture builders
//!
//! The cross-crate command-handler tests live in `tests/`.

use chrono::{DateTime, TimeZone, Utc};
use s2s_core::content::{ContentError, ContentSource, Session};
use s2s_core::environment::Clock;
use s2s_core::event::{Event, Recorded};
use s2s_core::event_log::{EventLog, StoreError};
use s2s_core::ids::{SessionId, SpeakerId, Version};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Fixed clock for deterministic tests: always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// A clock pinned to the given time.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A clock pinned to a fixed, arbitrary test instant.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_instant())
}

/// The instant [`test_clock`] is pinned to.
#[must_use]
pub fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 15, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// In-memory event log with the production version semantics.
///
/// Appends are atomic for the whole batch, sequences are contiguous and
/// 1-based, and an `expected_version` mismatch is rejected with
/// [`StoreError::ConcurrencyConflict`] exactly like the Postgres store.
pub struct InMemoryEventLog<E> {
    events: Mutex<Vec<Recorded<E>>>,
    clock: Arc<dyn Clock>,
}

impl<E> InMemoryEventLog<E> {
    /// An empty log stamping events with the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            clock,
        }
    }
}

impl<E> Default for InMemoryEventLog<E> {
    fn default() -> Self {
        Self::new(Arc::new(test_clock()))
    }
}

impl<E: Event + Clone> EventLog<E> for InMemoryEventLog<E> {
    fn append(
        &self,
        expected_version: Option<Version>,
        events: Vec<E>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut log = self
                .events
                .lock()
                .map_err(|_| StoreError::Backend("event log lock poisoned".to_string()))?;

            let actual = Version::new(log.len() as u64);
            if let Some(expected) = expected_version {
                if expected != actual {
                    return Err(StoreError::ConcurrencyConflict { expected, actual });
                }
            }

            let timestamp = self.clock.now();
            for event in events {
                let sequence = log.len() as u64 + 1;
                log.push(Recorded {
                    sequence,
                    timestamp,
                    event,
                });
            }

            Ok(Version::new(log.len() as u64))
        })
    }

    fn read_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Recorded<E>>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.events
                .lock()
                .map(|log| log.clone())
                .map_err(|_| StoreError::Backend("event log lock poisoned".to_string()))
        })
    }
}

/// A canned conference schedule.
pub struct StaticContent {
    sessions: Vec<Session>,
}

impl StaticContent {
    /// A content source serving exactly the given sessions.
    #[must_use]
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }
}

impl ContentSource for StaticContent {
    fn sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, ContentError>> + Send + '_>> {
        Box::pin(async move { Ok(self.sessions.clone()) })
    }
}

/// A scheduled session fixture.
#[must_use]
pub fn scheduled_session(id: &str, starts_at: DateTime<Utc>, speakers: &[&str]) -> Session {
    Session {
        id: SessionId::new(id),
        title: format!("Session {id}"),
        starts_at: Some(starts_at),
        speakers: speakers.iter().map(|s| SpeakerId::new(*s)).collect(),
    }
}

/// A session fixture with no start time yet.
#[must_use]
pub fn unscheduled_session(id: &str, speakers: &[&str]) -> Session {
    Session {
        id: SessionId::new(id),
        title: format!("Session {id}"),
        starts_at: None,
        speakers: speakers.iter().map(|s| SpeakerId::new(*s)).collect(),
    }
}

/// Initialize a compact tracing subscriber for a test run.
///
/// Respects `RUST_LOG`; safe to call from multiple tests (later calls are
/// no-ops).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use s2s_core::event::BookmarkEvent;
    use s2s_core::ids::UserId;

    fn bookmark(id: &str) -> BookmarkEvent {
        BookmarkEvent::Bookmarked {
            user_id: UserId::new("u-1"),
            session_id: SessionId::new(id),
        }
    }

    #[tokio::test]
    async fn sequences_are_contiguous_and_one_based() {
        let log = InMemoryEventLog::default();

        log.append(None, vec![bookmark("s-1"), bookmark("s-2")])
            .await
            .unwrap();
        log.append(None, vec![bookmark("s-3")]).await.unwrap();

        let events = log.read_all().await.unwrap();
        let sequences: Vec<u64> = events.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(events.iter().all(|r| r.timestamp == test_instant()));
    }

    #[tokio::test]
    async fn version_mismatch_is_rejected_without_writing() {
        let log = InMemoryEventLog::default();
        log.append(None, vec![bookmark("s-1")]).await.unwrap();

        let result = log
            .append(Some(Version::INITIAL), vec![bookmark("s-2")])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { expected, actual })
                if expected == Version::INITIAL && actual == Version::new(1)
        ));
        assert_eq!(log.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn matching_version_appends() {
        let log = InMemoryEventLog::default();
        let version = log
            .append(Some(Version::INITIAL), vec![bookmark("s-1")])
            .await
            .unwrap();
        assert_eq!(version, Version::new(1));
    }
}
