//! Conference content source contract.
//!
//! The schedule (sessions, their start times, and which speakers present
//! them) lives in an external read-only API and is cached with a TTL by the
//! implementing crate. Command handlers use it for two things only:
//! resolving a speaker's home session (for removal and approval checks) and
//! comparing start times for conflict detection.
//!
//! Staleness is acceptable here: assignment invariants are re-validated
//! against the event ledger at commit time, never against content data.

use crate::ids::{SessionId, SpeakerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from the content collaborator.
///
/// Infrastructure errors: not retried by the core, propagated to the caller
/// distinct from domain rejections.
#[derive(Error, Debug)]
pub enum ContentError {
    /// The upstream API could not be reached or answered with an error.
    #[error("Content source unavailable: {0}")]
    Unavailable(String),

    /// The upstream payload did not match the expected schema.
    #[error("Malformed content payload: {0}")]
    Malformed(String),
}

/// A conference session as known to the content source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier, shared with the event ledger.
    pub id: SessionId,
    /// Session title.
    pub title: String,
    /// Scheduled start time; `None` while the schedule is still in flux.
    pub starts_at: Option<DateTime<Utc>>,
    /// Speakers presenting this session.
    pub speakers: Vec<SpeakerId>,
}

/// Read-only access to the conference schedule.
///
/// Implementations may cache; consumers tolerate stale-by-TTL data.
pub trait ContentSource: Send + Sync {
    /// The full session list.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] when the upstream source is unavailable or
    /// its payload is malformed.
    fn sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, ContentError>> + Send + '_>>;
}

/// Find the session a speaker is presenting (their "home" session).
#[must_use]
pub fn home_session<'a>(sessions: &'a [Session], speaker_id: &SpeakerId) -> Option<&'a Session> {
    sessions.iter().find(|s| s.speakers.contains(speaker_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, speakers: &[&str]) -> Session {
        Session {
            id: SessionId::new(id),
            title: format!("Session {id}"),
            starts_at: None,
            speakers: speakers.iter().map(|s| SpeakerId::new(*s)).collect(),
        }
    }

    #[test]
    fn home_session_finds_presenter() {
        let sessions = vec![session("s-1", &["sp-a"]), session("s-2", &["sp-b", "sp-c"])];

        let home = home_session(&sessions, &SpeakerId::new("sp-c"));
        assert_eq!(home.map(|s| s.id.as_str()), Some("s-2"));
    }

    #[test]
    fn home_session_none_for_unknown_speaker() {
        let sessions = vec![session("s-1", &["sp-a"])];
        assert!(home_session(&sessions, &SpeakerId::new("sp-x")).is_none());
    }
}
