//! Domain events for the three conference ledgers.
//!
//! Events are immutable facts: they are appended, never updated, never
//! deleted. Even a removal is a new event layered on top of the history.
//! Current state is always recomputed by replaying a ledger in order (see
//! [`crate::projection`]), so the log is the single source of truth.
//!
//! Events are serialized with `bincode` and tagged with a versioned
//! `event_type` string, which allows schema evolution without touching
//! already-stored rows.

use crate::feedback::SpeakerFeedbackForm;
use crate::ids::{SessionId, SpeakerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Error types for event serialization.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize an event to bytes.
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    /// Failed to deserialize an event from bytes.
    #[error("Failed to deserialize event: {0}")]
    Deserialization(String),
}

/// An event that can be appended to a ledger and replayed.
///
/// The `event_type()` string is stored alongside the payload and includes a
/// version suffix (`"SpeakerSignedUp.v1"`) so event schemas can evolve.
pub trait Event: Send + Sync + 'static {
    /// Stable, versioned identifier for this event variant.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Serialization`] if the event cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::Serialization(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Deserialization`] if the bytes do not decode
    /// into this event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::Deserialization(e.to_string()))
    }
}

/// An event as recorded in a ledger.
///
/// The store assigns `sequence` and `timestamp` at append time. `sequence`
/// is 1-based, contiguous, and defines the total replay order; it breaks
/// ties between events recorded within the same millisecond.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recorded<E> {
    /// Insertion order within the ledger (1-based, gap-free).
    pub sequence: u64,
    /// Wall-clock time the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// The domain event itself.
    pub event: E,
}

/// Attendee rating of a session.
///
/// A closed three-step scale; ordering derives from declaration order so
/// projections can sort by rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    /// Lowest rating.
    Poor,
    /// Middle rating.
    Good,
    /// Highest rating.
    Great,
}

impl Rating {
    /// Numeric value of the rating (0, 1, or 2).
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Poor => 0,
            Self::Good => 1,
            Self::Great => 2,
        }
    }
}

/// Events of the speaker-to-speaker ledger.
///
/// The speaker id is the speaker the event is about; for assignment events
/// the session id is the session being reviewed, not the speaker's own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpeakerEvent {
    /// The speaker opted into the peer-feedback program.
    SignedUp {
        /// Speaker who signed up.
        speaker_id: SpeakerId,
    },
    /// The speaker was removed from the program (cascading unassignments are
    /// recorded as separate events in the same atomic batch).
    Removed {
        /// Speaker who was removed.
        speaker_id: SpeakerId,
    },
    /// The speaker took on a session to review.
    SessionAssigned {
        /// Reviewing speaker.
        speaker_id: SpeakerId,
        /// Session under review.
        session_id: SessionId,
    },
    /// The speaker dropped (or was dropped from) a review assignment.
    SessionUnassigned {
        /// Reviewing speaker.
        speaker_id: SpeakerId,
        /// Session under review.
        session_id: SessionId,
    },
    /// The speaker submitted peer feedback for a session. Always appended
    /// fresh; the latest submission wins at replay time.
    FeedbackSubmitted {
        /// Reviewing speaker.
        speaker_id: SpeakerId,
        /// Session the feedback is about.
        session_id: SessionId,
        /// The submitted form.
        data: SpeakerFeedbackForm,
    },
    /// An admin approved the speaker's latest feedback for a session.
    /// Approval is layered on top of the feedback; it never alters it.
    FeedbackApproved {
        /// Speaker whose feedback was approved.
        speaker_id: SpeakerId,
        /// Session the feedback is about.
        session_id: SessionId,
        /// Admin who approved.
        by: UserId,
    },
}

impl Event for SpeakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::SignedUp { .. } => "SpeakerSignedUp.v1",
            Self::Removed { .. } => "SpeakerRemoved.v1",
            Self::SessionAssigned { .. } => "SessionAssigned.v1",
            Self::SessionUnassigned { .. } => "SessionUnassigned.v1",
            Self::FeedbackSubmitted { .. } => "SessionFeedbackSubmitted.v1",
            Self::FeedbackApproved { .. } => "SessionFeedbackApproved.v1",
        }
    }
}

impl SpeakerEvent {
    /// The speaker this event is about.
    #[must_use]
    pub const fn speaker_id(&self) -> &SpeakerId {
        match self {
            Self::SignedUp { speaker_id }
            | Self::Removed { speaker_id }
            | Self::SessionAssigned { speaker_id, .. }
            | Self::SessionUnassigned { speaker_id, .. }
            | Self::FeedbackSubmitted { speaker_id, .. }
            | Self::FeedbackApproved { speaker_id, .. } => speaker_id,
        }
    }
}

/// Events of the attendee-feedback ledger, keyed by (user, session).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttendeeEvent {
    /// The attendee rated a session. Re-rating appends a new event.
    Rated {
        /// Rating attendee.
        user_id: UserId,
        /// Rated session.
        session_id: SessionId,
        /// The rating given.
        rating: Rating,
    },
    /// The attendee left a written review. Re-reviewing appends a new event.
    Reviewed {
        /// Reviewing attendee.
        user_id: UserId,
        /// Reviewed session.
        session_id: SessionId,
        /// The review text.
        review: String,
    },
    /// An admin approved the attendee's feedback for publication.
    Approved {
        /// Attendee whose feedback was approved.
        user_id: UserId,
        /// Session the feedback is about.
        session_id: SessionId,
        /// Admin who approved.
        by: UserId,
    },
    /// An admin revoked a previous approval.
    Unapproved {
        /// Attendee whose feedback was unapproved.
        user_id: UserId,
        /// Session the feedback is about.
        session_id: SessionId,
        /// Admin who unapproved.
        by: UserId,
    },
}

impl Event for AttendeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Rated { .. } => "SessionRated.v1",
            Self::Reviewed { .. } => "SessionReviewed.v1",
            Self::Approved { .. } => "AttendeeFeedbackApproved.v1",
            Self::Unapproved { .. } => "AttendeeFeedbackUnapproved.v1",
        }
    }
}

impl AttendeeEvent {
    /// The (user, session) pair this event belongs to.
    #[must_use]
    pub const fn key(&self) -> (&UserId, &SessionId) {
        match self {
            Self::Rated {
                user_id,
                session_id,
                ..
            }
            | Self::Reviewed {
                user_id,
                session_id,
                ..
            }
            | Self::Approved {
                user_id,
                session_id,
                ..
            }
            | Self::Unapproved {
                user_id,
                session_id,
                ..
            } => (user_id, session_id),
        }
    }
}

/// Events of the bookmark ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BookmarkEvent {
    /// The user bookmarked a session.
    Bookmarked {
        /// Bookmarking user.
        user_id: UserId,
        /// Bookmarked session.
        session_id: SessionId,
    },
    /// The user removed a bookmark.
    Unbookmarked {
        /// Unbookmarking user.
        user_id: UserId,
        /// Unbookmarked session.
        session_id: SessionId,
    },
}

impl Event for BookmarkEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Bookmarked { .. } => "SessionBookmarked.v1",
            Self::Unbookmarked { .. } => "SessionUnbookmarked.v1",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_type_is_versioned() {
        let event = SpeakerEvent::SignedUp {
            speaker_id: SpeakerId::new("sp-1"),
        };
        assert_eq!(event.event_type(), "SpeakerSignedUp.v1");
    }

    #[test]
    fn speaker_event_roundtrip() {
        let event = SpeakerEvent::SessionAssigned {
            speaker_id: SpeakerId::new("sp-1"),
            session_id: SessionId::new("s-100"),
        };

        let bytes = event.to_bytes().unwrap();
        let decoded = SpeakerEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn attendee_event_roundtrip() {
        let event = AttendeeEvent::Rated {
            user_id: UserId::new("u-1"),
            session_id: SessionId::new("s-100"),
            rating: Rating::Great,
        };

        let bytes = event.to_bytes().unwrap();
        let decoded = AttendeeEvent::from_bytes(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn rating_ordering() {
        assert!(Rating::Poor < Rating::Good);
        assert!(Rating::Good < Rating::Great);
        assert_eq!(Rating::Great.as_u8(), 2);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = SpeakerEvent::from_bytes(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(EventError::Deserialization(_))));
    }
}
