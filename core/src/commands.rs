//! Command handlers: the write side of the three ledgers.
//!
//! Every handler follows the same cycle: read the full ledger, validate the
//! command against the replayed state, append the resulting events with the
//! version the validation saw. If another writer committed in between, the
//! append fails with a concurrency conflict and the whole cycle retries
//! (bounded), re-validating against the winning history. Invariants such as
//! the two-assignment cap therefore hold under concurrent commands.
//!
//! Handlers return the events they appended so callers can log or echo them;
//! domain rejections carry the human-readable messages shown to users.

use crate::content::{ContentError, ContentSource, Session, home_session};
use crate::event::{AttendeeEvent, BookmarkEvent, Event, Rating, Recorded, SpeakerEvent};
use crate::event_log::{EventLog, StoreError, version_of};
use crate::feedback::{FeedbackError, SpeakerFeedbackForm};
use crate::ids::{SessionId, SpeakerId, UserId};
use crate::projection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// A speaker may review at most this many sessions.
pub const MAX_ASSIGNMENTS_PER_SPEAKER: usize = 2;

/// A session may have at most this many reviewers.
pub const MAX_ASSIGNEES_PER_SESSION: usize = 2;

/// Bounded retries for the read-validate-append cycle on conflict.
const MAX_APPEND_ATTEMPTS: u32 = 3;

/// Role of the caller, resolved by the auth collaborator upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Regular conference attendee.
    Attendee,
    /// Speaker participating in peer feedback.
    Speaker,
    /// Conference administrator.
    Admin,
}

/// The authenticated caller of a command.
///
/// Commands never resolve identity themselves; the actor arrives already
/// authenticated, with its role claim attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// The caller's user id.
    pub user_id: UserId,
    /// The caller's resolved role.
    pub role: Role,
}

impl Actor {
    /// An actor with the given role.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// An admin actor.
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Reject non-admin callers.
    ///
    /// Checked before any read or write, so unauthorized commands never
    /// touch a ledger.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unauthorized`] unless the role is `Admin`.
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }
}

/// Expected, recoverable command rejections.
///
/// The `Display` strings are the exact messages surfaced to users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The caller lacks the required role.
    #[error("Unauthorized")]
    Unauthorized,

    /// Sign-up is idempotent-guarded; a second sign-up is rejected.
    #[error("Speaker already signed up")]
    AlreadySignedUp,

    /// The speaker is not currently signed up.
    #[error("Speaker not signed up")]
    NotSignedUp,

    /// The speaker already reviews this session.
    #[error("Speaker already assigned to session")]
    AlreadyAssigned,

    /// The speaker does not currently review this session.
    #[error("Speaker not assigned to session")]
    NotAssigned,

    /// The speaker already reviews the maximum number of sessions.
    #[error("Assignment Limit Reached")]
    AssignmentLimit,

    /// The session already has the maximum number of reviewers.
    #[error("Session Limit Reached")]
    SessionLimit,

    /// The session overlaps a slot the speaker is already committed to,
    /// including their own talk.
    #[error("Timeslot Conflict")]
    TimeslotConflict,

    /// The session id does not exist in the conference content.
    #[error("Invalid session id")]
    UnknownSession,

    /// The speaker has no resolvable session in the conference content.
    #[error("Invalid speaker id")]
    UnknownSpeaker,

    /// The session is already bookmarked by this user.
    #[error("Session already bookmarked")]
    AlreadyBookmarked,

    /// The session is not currently bookmarked by this user.
    #[error("Session not bookmarked")]
    NotBookmarked,

    /// The submitted feedback failed structural validation.
    #[error(transparent)]
    InvalidFeedback(#[from] FeedbackError),
}

/// Everything a command can fail with.
///
/// Domain rejections are expected outcomes; store and content errors are
/// infrastructure faults propagated as-is.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command was rejected by a domain rule.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The event log failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The content source failed.
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl From<FeedbackError> for CommandError {
    fn from(error: FeedbackError) -> Self {
        Self::Domain(DomainError::InvalidFeedback(error))
    }
}

/// Read-validate-append with bounded retry on concurrency conflict.
///
/// `validate` sees the replayed history and either rejects or produces the
/// batch to append. An empty batch commits nothing and succeeds.
async fn commit<E, F>(log: &Arc<dyn EventLog<E>>, validate: F) -> Result<Vec<E>, CommandError>
where
    E: Event + Clone,
    F: Fn(&[Recorded<E>]) -> Result<Vec<E>, CommandError>,
{
    let mut attempt = 1;
    loop {
        let history = log.read_all().await?;
        let version = version_of(&history);
        let events = validate(&history)?;
        if events.is_empty() {
            return Ok(events);
        }

        match log.append(Some(version), events.clone()).await {
            Ok(_) => return Ok(events),
            Err(StoreError::ConcurrencyConflict { .. }) if attempt < MAX_APPEND_ATTEMPTS => {
                debug!(attempt, "append lost the race, re-validating");
                attempt += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Commands on the speaker-to-speaker ledger.
pub struct SpeakerCommands {
    log: Arc<dyn EventLog<SpeakerEvent>>,
    content: Arc<dyn ContentSource>,
}

impl SpeakerCommands {
    /// Handler over the speaker ledger and the conference content source.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog<SpeakerEvent>>, content: Arc<dyn ContentSource>) -> Self {
        Self { log, content }
    }

    /// Opt a speaker into the peer-feedback program.
    ///
    /// # Errors
    ///
    /// [`DomainError::AlreadySignedUp`] if the speaker is currently signed
    /// up; store errors on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn sign_up(&self, speaker_id: &SpeakerId) -> Result<Vec<SpeakerEvent>, CommandError> {
        commit(&self.log, |history| {
            if projection::signed_up_speakers(history).contains(speaker_id) {
                return Err(DomainError::AlreadySignedUp.into());
            }
            Ok(vec![SpeakerEvent::SignedUp {
                speaker_id: speaker_id.clone(),
            }])
        })
        .await
    }

    /// Assign a speaker to review a session.
    ///
    /// Validation order: already assigned, session exists, assignment cap,
    /// timeslot conflict (against assigned sessions and the speaker's own
    /// talk), session reviewer cap. The timeslot check only fires when both
    /// start times are scheduled.
    ///
    /// # Errors
    ///
    /// The first failing rule as a [`DomainError`]; store/content errors on
    /// infrastructure failure.
    #[instrument(skip(self))]
    pub async fn assign(
        &self,
        speaker_id: &SpeakerId,
        session_id: &SessionId,
    ) -> Result<Vec<SpeakerEvent>, CommandError> {
        // Content staleness is tolerable: the cap and duplicate invariants
        // are re-validated against the ledger at commit time.
        let sessions = self.content.sessions().await?;

        commit(&self.log, |history| {
            let assigned = projection::speaker_assignments(history, speaker_id);
            if assigned.contains(session_id) {
                return Err(DomainError::AlreadyAssigned.into());
            }

            let target = sessions
                .iter()
                .find(|s| &s.id == session_id)
                .ok_or(DomainError::UnknownSession)?;

            if assigned.len() >= MAX_ASSIGNMENTS_PER_SPEAKER {
                return Err(DomainError::AssignmentLimit.into());
            }

            if let Some(start) = target.starts_at {
                if occupied_slots(&sessions, &assigned, speaker_id).contains(&start) {
                    return Err(DomainError::TimeslotConflict.into());
                }
            }

            if projection::session_assignees(history, session_id).len()
                >= MAX_ASSIGNEES_PER_SESSION
            {
                return Err(DomainError::SessionLimit.into());
            }

            Ok(vec![SpeakerEvent::SessionAssigned {
                speaker_id: speaker_id.clone(),
                session_id: session_id.clone(),
            }])
        })
        .await
    }

    /// Drop a speaker's review assignment.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotAssigned`] if the speaker does not currently review
    /// the session; store errors on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn unassign(
        &self,
        speaker_id: &SpeakerId,
        session_id: &SessionId,
    ) -> Result<Vec<SpeakerEvent>, CommandError> {
        commit(&self.log, |history| {
            if !projection::speaker_assignments(history, speaker_id).contains(session_id) {
                return Err(DomainError::NotAssigned.into());
            }
            Ok(vec![SpeakerEvent::SessionUnassigned {
                speaker_id: speaker_id.clone(),
                session_id: session_id.clone(),
            }])
        })
        .await
    }

    /// Remove a speaker from the program entirely (admin only).
    ///
    /// Appends one atomic batch: the removal, an unassignment for every
    /// reviewer of the speaker's own session, and an unassignment for every
    /// session the speaker was reviewing. After replay the speaker holds no
    /// assignments and their session has no reviewers.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for non-admins (checked before any
    /// read), [`DomainError::NotSignedUp`] if the speaker is not signed up,
    /// [`DomainError::UnknownSpeaker`] if no session of theirs can be
    /// resolved; store/content errors on infrastructure failure.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn remove_speaker(
        &self,
        actor: &Actor,
        speaker_id: &SpeakerId,
    ) -> Result<Vec<SpeakerEvent>, CommandError> {
        actor.require_admin()?;
        let sessions = self.content.sessions().await?;

        commit(&self.log, |history| {
            if !projection::signed_up_speakers(history).contains(speaker_id) {
                return Err(DomainError::NotSignedUp.into());
            }
            let home = home_session(&sessions, speaker_id).ok_or(DomainError::UnknownSpeaker)?;

            let mut batch = vec![SpeakerEvent::Removed {
                speaker_id: speaker_id.clone(),
            }];
            for reviewer in projection::session_assignees(history, &home.id) {
                batch.push(SpeakerEvent::SessionUnassigned {
                    speaker_id: reviewer,
                    session_id: home.id.clone(),
                });
            }
            for session in projection::speaker_assignments(history, speaker_id) {
                batch.push(SpeakerEvent::SessionUnassigned {
                    speaker_id: speaker_id.clone(),
                    session_id: session,
                });
            }
            Ok(batch)
        })
        .await
    }

    /// Submit (or resubmit) peer feedback for a session.
    ///
    /// Always appends a fresh event; at replay the latest submission wins
    /// and earlier ones remain in the history.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidFeedback`] if the form fails validation; store
    /// errors on infrastructure failure.
    #[instrument(skip(self, form))]
    pub async fn submit_feedback(
        &self,
        speaker_id: &SpeakerId,
        session_id: &SessionId,
        form: SpeakerFeedbackForm,
    ) -> Result<Vec<SpeakerEvent>, CommandError> {
        form.validate()?;

        let events = vec![SpeakerEvent::FeedbackSubmitted {
            speaker_id: speaker_id.clone(),
            session_id: session_id.clone(),
            data: form,
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }

    /// Approve a reviewer's feedback for a session (admin only).
    ///
    /// Approval is layered on top of the submission and never alters it.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for non-admins,
    /// [`DomainError::UnknownSpeaker`] if the reviewer has no resolvable
    /// session in the conference content; store/content errors on
    /// infrastructure failure.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn approve_feedback(
        &self,
        actor: &Actor,
        speaker_id: &SpeakerId,
        session_id: &SessionId,
    ) -> Result<Vec<SpeakerEvent>, CommandError> {
        actor.require_admin()?;
        let sessions = self.content.sessions().await?;
        if home_session(&sessions, speaker_id).is_none() {
            return Err(DomainError::UnknownSpeaker.into());
        }

        let events = vec![SpeakerEvent::FeedbackApproved {
            speaker_id: speaker_id.clone(),
            session_id: session_id.clone(),
            by: actor.user_id.clone(),
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }
}

/// Start times the speaker is already committed to: their current review
/// assignments plus their own talk. Unscheduled sessions contribute nothing.
fn occupied_slots(
    sessions: &[Session],
    assigned: &[SessionId],
    speaker_id: &SpeakerId,
) -> Vec<chrono::DateTime<chrono::Utc>> {
    let mut slots: Vec<_> = assigned
        .iter()
        .filter_map(|id| sessions.iter().find(|s| &s.id == id))
        .filter_map(|s| s.starts_at)
        .collect();
    if let Some(start) = home_session(sessions, speaker_id).and_then(|s| s.starts_at) {
        slots.push(start);
    }
    slots
}

/// Commands on the attendee-feedback ledger.
pub struct AttendeeCommands {
    log: Arc<dyn EventLog<AttendeeEvent>>,
}

impl AttendeeCommands {
    /// Handler over the attendee-feedback ledger.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog<AttendeeEvent>>) -> Self {
        Self { log }
    }

    /// Record an attendee's rating for a session. Re-rating appends a new
    /// event; the latest wins at replay.
    ///
    /// # Errors
    ///
    /// Store errors on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn rate(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        rating: Rating,
    ) -> Result<Vec<AttendeeEvent>, CommandError> {
        let events = vec![AttendeeEvent::Rated {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            rating,
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }

    /// Record an attendee's written review for a session.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidFeedback`] if the review is empty after
    /// trimming; store errors on infrastructure failure.
    #[instrument(skip(self, review))]
    pub async fn review(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        review: String,
    ) -> Result<Vec<AttendeeEvent>, CommandError> {
        if review.trim().is_empty() {
            return Err(FeedbackError::EmptyField("review").into());
        }

        let events = vec![AttendeeEvent::Reviewed {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            review,
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }

    /// Approve an attendee's feedback for speaker visibility (admin only).
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for non-admins; store errors on
    /// infrastructure failure.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<Vec<AttendeeEvent>, CommandError> {
        actor.require_admin()?;

        let events = vec![AttendeeEvent::Approved {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            by: actor.user_id.clone(),
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }

    /// Revoke a previous approval (admin only).
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for non-admins; store errors on
    /// infrastructure failure.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn unapprove(
        &self,
        actor: &Actor,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<Vec<AttendeeEvent>, CommandError> {
        actor.require_admin()?;

        let events = vec![AttendeeEvent::Unapproved {
            user_id: user_id.clone(),
            session_id: session_id.clone(),
            by: actor.user_id.clone(),
        }];
        self.log.append(None, events.clone()).await?;
        Ok(events)
    }

    /// Approve every currently-unapproved (user, session) pair in one
    /// atomic batch (admin only). A no-op when nothing is pending.
    ///
    /// # Errors
    ///
    /// [`DomainError::Unauthorized`] for non-admins; store errors on
    /// infrastructure failure.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn approve_all(&self, actor: &Actor) -> Result<Vec<AttendeeEvent>, CommandError> {
        actor.require_admin()?;
        let by = actor.user_id.clone();

        commit(&self.log, |history| {
            Ok(projection::unapproved_feedback(history)
                .into_iter()
                .map(|(user_id, session_id)| AttendeeEvent::Approved {
                    user_id,
                    session_id,
                    by: by.clone(),
                })
                .collect())
        })
        .await
    }
}

/// Commands on the bookmark ledger.
pub struct BookmarkCommands {
    log: Arc<dyn EventLog<BookmarkEvent>>,
}

impl BookmarkCommands {
    /// Handler over the bookmark ledger.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog<BookmarkEvent>>) -> Self {
        Self { log }
    }

    /// Bookmark a session for a user.
    ///
    /// # Errors
    ///
    /// [`DomainError::AlreadyBookmarked`] if already bookmarked; store
    /// errors on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn bookmark(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<Vec<BookmarkEvent>, CommandError> {
        commit(&self.log, |history| {
            if projection::bookmarked_sessions(history, user_id).contains(session_id) {
                return Err(DomainError::AlreadyBookmarked.into());
            }
            Ok(vec![BookmarkEvent::Bookmarked {
                user_id: user_id.clone(),
                session_id: session_id.clone(),
            }])
        })
        .await
    }

    /// Remove a user's bookmark from a session.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotBookmarked`] if not currently bookmarked; store
    /// errors on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn unbookmark(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<Vec<BookmarkEvent>, CommandError> {
        commit(&self.log, |history| {
            if !projection::bookmarked_sessions(history, user_id).contains(session_id) {
                return Err(DomainError::NotBookmarked.into());
            }
            Ok(vec![BookmarkEvent::Unbookmarked {
                user_id: user_id.clone(),
                session_id: session_id.clone(),
            }])
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_admin_rejects_other_roles() {
        assert_eq!(
            Actor::new("u-1", Role::Attendee).require_admin(),
            Err(DomainError::Unauthorized)
        );
        assert_eq!(
            Actor::new("u-1", Role::Speaker).require_admin(),
            Err(DomainError::Unauthorized)
        );
        assert_eq!(Actor::admin("u-1").require_admin(), Ok(()));
    }

    #[test]
    fn domain_errors_carry_user_facing_messages() {
        assert_eq!(
            DomainError::AssignmentLimit.to_string(),
            "Assignment Limit Reached"
        );
        assert_eq!(
            DomainError::TimeslotConflict.to_string(),
            "Timeslot Conflict"
        );
        assert_eq!(DomainError::SessionLimit.to_string(), "Session Limit Reached");
        assert_eq!(DomainError::UnknownSession.to_string(), "Invalid session id");
        assert_eq!(
            DomainError::AlreadyBookmarked.to_string(),
            "Session already bookmarked"
        );
    }

    #[test]
    fn feedback_error_converts_to_domain() {
        let error: CommandError = FeedbackError::RatingOutOfRange.into();
        assert!(matches!(
            error,
            CommandError::Domain(DomainError::InvalidFeedback(_))
        ));
    }
}
