//! Pure read models derived by replaying a ledger.
//!
//! Every function here is a left-to-right fold over events in ascending
//! sequence order. There is no persisted "current state" anywhere: reads
//! recompute from the full history, which keeps the read model trivially
//! consistent with the log. Replays are deterministic; calling any function
//! twice with the same slice yields identical results.
//!
//! Complexity is O(n) over the ledger per call. At conference scale this is
//! the right trade: recomputation on every read buys a store with no
//! secondary indexes and no cache invalidation.

use crate::event::{AttendeeEvent, BookmarkEvent, Rating, Recorded, SpeakerEvent};
use crate::feedback::SpeakerFeedbackForm;
use crate::ids::{SessionId, SpeakerId, UserId};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Speaker ledger
// ---------------------------------------------------------------------------

/// Speakers currently signed up for the peer-feedback program.
///
/// Added on `SignedUp`, dropped on `Removed`; a speaker is signed up iff
/// their most recent such event is `SignedUp`. Order of first sign-up is
/// preserved.
#[must_use]
pub fn signed_up_speakers(events: &[Recorded<SpeakerEvent>]) -> Vec<SpeakerId> {
    events.iter().fold(Vec::new(), |mut acc, recorded| {
        match &recorded.event {
            SpeakerEvent::SignedUp { speaker_id } => acc.push(speaker_id.clone()),
            SpeakerEvent::Removed { speaker_id } => acc.retain(|s| s != speaker_id),
            _ => {}
        }
        acc
    })
}

/// Sessions the given speaker is currently assigned to review.
#[must_use]
pub fn speaker_assignments(
    events: &[Recorded<SpeakerEvent>],
    speaker_id: &SpeakerId,
) -> Vec<SessionId> {
    events.iter().fold(Vec::new(), |mut acc, recorded| {
        match &recorded.event {
            SpeakerEvent::SessionAssigned {
                speaker_id: sp,
                session_id,
            } if sp == speaker_id => acc.push(session_id.clone()),
            SpeakerEvent::SessionUnassigned {
                speaker_id: sp,
                session_id,
            } if sp == speaker_id => acc.retain(|s| s != session_id),
            _ => {}
        }
        acc
    })
}

/// Speakers currently assigned to review the given session.
#[must_use]
pub fn session_assignees(
    events: &[Recorded<SpeakerEvent>],
    session_id: &SessionId,
) -> Vec<SpeakerId> {
    events.iter().fold(Vec::new(), |mut acc, recorded| {
        match &recorded.event {
            SpeakerEvent::SessionAssigned {
                speaker_id,
                session_id: s,
            } if s == session_id => acc.push(speaker_id.clone()),
            SpeakerEvent::SessionUnassigned {
                speaker_id,
                session_id: s,
            } if s == session_id => acc.retain(|sp| sp != speaker_id),
            _ => {}
        }
        acc
    })
}

/// Current assignee lists for every session, in a single fold.
///
/// Equivalent to calling [`session_assignees`] per session, without the
/// O(n·m) refetching. Sessions whose assignees have all been unassigned
/// remain in the map with an empty list.
#[must_use]
pub fn all_assignments(
    events: &[Recorded<SpeakerEvent>],
) -> HashMap<SessionId, Vec<SpeakerId>> {
    events.iter().fold(HashMap::new(), |mut acc, recorded| {
        match &recorded.event {
            SpeakerEvent::SessionAssigned {
                speaker_id,
                session_id,
            } => acc
                .entry(session_id.clone())
                .or_default()
                .push(speaker_id.clone()),
            SpeakerEvent::SessionUnassigned {
                speaker_id,
                session_id,
            } => {
                if let Some(assignees) = acc.get_mut(session_id) {
                    assignees.retain(|sp| sp != speaker_id);
                }
            }
            _ => {}
        }
        acc
    })
}

/// The current feedback a speaker has submitted for a session.
///
/// Submissions are append-only; the latest `FeedbackSubmitted` event for the
/// (speaker, session) pair wins. `None` if the speaker never submitted.
#[must_use]
pub fn feedback_for(
    events: &[Recorded<SpeakerEvent>],
    speaker_id: &SpeakerId,
    session_id: &SessionId,
) -> Option<SpeakerFeedbackForm> {
    events
        .iter()
        .filter_map(|recorded| match &recorded.event {
            SpeakerEvent::FeedbackSubmitted {
                speaker_id: sp,
                session_id: s,
                data,
            } if sp == speaker_id && s == session_id => Some(data),
            _ => None,
        })
        .next_back()
        .cloned()
}

/// One reviewer's current feedback for a session, with approval state.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionFeedback {
    /// The reviewing speaker.
    pub speaker_id: SpeakerId,
    /// Their latest submitted form.
    pub data: SpeakerFeedbackForm,
    /// Whether an admin has approved it.
    pub approved: bool,
}

/// All peer feedback submitted for a session.
///
/// One entry per speaker who submitted, ordered by first submission.
/// Later submissions replace `data` in place; `FeedbackApproved` events flip
/// `approved` without touching the content. Approvals for speakers who never
/// submitted are ignored in this view.
#[must_use]
pub fn feedback_for_session(
    events: &[Recorded<SpeakerEvent>],
    session_id: &SessionId,
) -> Vec<SessionFeedback> {
    events.iter().fold(Vec::new(), |mut acc, recorded| {
        match &recorded.event {
            SpeakerEvent::FeedbackSubmitted {
                speaker_id,
                session_id: s,
                data,
            } if s == session_id => {
                if let Some(entry) = acc.iter_mut().find(|e| &e.speaker_id == speaker_id) {
                    entry.data = data.clone();
                } else {
                    acc.push(SessionFeedback {
                        speaker_id: speaker_id.clone(),
                        data: data.clone(),
                        approved: false,
                    });
                }
            }
            SpeakerEvent::FeedbackApproved {
                speaker_id,
                session_id: s,
                ..
            } if s == session_id => {
                if let Some(entry) = acc.iter_mut().find(|e| &e.speaker_id == speaker_id) {
                    entry.approved = true;
                }
            }
            _ => {}
        }
        acc
    })
}

// ---------------------------------------------------------------------------
// Attendee-feedback ledger
// ---------------------------------------------------------------------------

/// One attendee's current feedback for one session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttendeeFeedback {
    /// Latest rating, if any.
    pub rating: Option<Rating>,
    /// Latest written review, if any.
    pub review: Option<String>,
}

/// The current rating/review a user has left for a session (last-wins).
#[must_use]
pub fn attendee_feedback(
    events: &[Recorded<AttendeeEvent>],
    user_id: &UserId,
    session_id: &SessionId,
) -> AttendeeFeedback {
    events
        .iter()
        .filter(|recorded| recorded.event.key() == (user_id, session_id))
        .fold(AttendeeFeedback::default(), |mut acc, recorded| {
            match &recorded.event {
                AttendeeEvent::Rated { rating, .. } => acc.rating = Some(*rating),
                AttendeeEvent::Reviewed { review, .. } => acc.review = Some(review.clone()),
                AttendeeEvent::Approved { .. } | AttendeeEvent::Unapproved { .. } => {}
            }
            acc
        })
}

/// One attendee's aggregated feedback in the speaker-facing session view.
///
/// The user id is withheld: speakers see what was said, not who said it.
#[derive(Clone, Debug, PartialEq)]
pub struct AttendeeSessionFeedback {
    /// Latest rating, if any.
    pub rating: Option<Rating>,
    /// Latest written review, if any.
    pub review: Option<String>,
    /// Whether an admin approved this feedback for the speaker to see.
    pub approved: bool,
}

/// All attendee feedback for a session, anonymized and aggregated.
///
/// One entry per attendee, created on their first event and updated in
/// place; `Approved`/`Unapproved` toggle the flag. Sorted with the longest
/// reviews first, rating breaking ties.
#[must_use]
pub fn session_feedback(
    events: &[Recorded<AttendeeEvent>],
    session_id: &SessionId,
) -> Vec<AttendeeSessionFeedback> {
    let mut entries: Vec<(UserId, AttendeeSessionFeedback)> = Vec::new();

    for recorded in events {
        let (user_id, s) = recorded.event.key();
        if s != session_id {
            continue;
        }

        let index = entries
            .iter()
            .position(|(u, _)| u == user_id)
            .unwrap_or_else(|| {
                entries.push((
                    user_id.clone(),
                    AttendeeSessionFeedback {
                        rating: None,
                        review: None,
                        approved: false,
                    },
                ));
                entries.len() - 1
            });
        let entry = &mut entries[index].1;

        match &recorded.event {
            AttendeeEvent::Rated { rating, .. } => entry.rating = Some(*rating),
            AttendeeEvent::Reviewed { review, .. } => entry.review = Some(review.clone()),
            AttendeeEvent::Approved { .. } => entry.approved = true,
            AttendeeEvent::Unapproved { .. } => entry.approved = false,
        }
    }

    let mut feedback: Vec<AttendeeSessionFeedback> =
        entries.into_iter().map(|(_, entry)| entry).collect();

    // Stable sorts: rating first so review length dominates with rating as
    // the tie-break, matching the public feedback page.
    feedback.sort_by(|a, b| {
        b.rating
            .map_or(0, Rating::as_u8)
            .cmp(&a.rating.map_or(0, Rating::as_u8))
    });
    feedback.sort_by(|a, b| {
        b.review
            .as_ref()
            .map_or(0, String::len)
            .cmp(&a.review.as_ref().map_or(0, String::len))
    });

    feedback
}

/// Raw attendee-feedback events, optionally filtered by user and/or session.
///
/// Used by admin views that render the log itself; no aggregation. Filtering
/// before the fold is a query-level optimization only and never changes
/// replay semantics.
#[must_use]
pub fn filter_events<'a>(
    events: &'a [Recorded<AttendeeEvent>],
    user_id: Option<&UserId>,
    session_id: Option<&SessionId>,
) -> Vec<&'a Recorded<AttendeeEvent>> {
    events
        .iter()
        .filter(|recorded| {
            let (u, s) = recorded.event.key();
            user_id.is_none_or(|user| user == u) && session_id.is_none_or(|session| session == s)
        })
        .collect()
}

/// (user, session) pairs whose feedback is currently unapproved.
///
/// Feeds bulk approval: one entry per pair that has any feedback event and
/// whose latest approval state is not approved, in first-appearance order.
#[must_use]
pub fn unapproved_feedback(events: &[Recorded<AttendeeEvent>]) -> Vec<(UserId, SessionId)> {
    let mut entries: Vec<(UserId, SessionId, bool)> = Vec::new();

    for recorded in events {
        let (user_id, session_id) = recorded.event.key();
        let index = entries
            .iter()
            .position(|(u, s, _)| u == user_id && s == session_id)
            .unwrap_or_else(|| {
                entries.push((user_id.clone(), session_id.clone(), false));
                entries.len() - 1
            });

        match &recorded.event {
            AttendeeEvent::Approved { .. } => entries[index].2 = true,
            AttendeeEvent::Unapproved { .. } => entries[index].2 = false,
            AttendeeEvent::Rated { .. } | AttendeeEvent::Reviewed { .. } => {}
        }
    }

    entries
        .into_iter()
        .filter(|(_, _, approved)| !approved)
        .map(|(user_id, session_id, _)| (user_id, session_id))
        .collect()
}

// ---------------------------------------------------------------------------
// Bookmark ledger
// ---------------------------------------------------------------------------

/// Sessions the given user currently has bookmarked.
#[must_use]
pub fn bookmarked_sessions(
    events: &[Recorded<BookmarkEvent>],
    user_id: &UserId,
) -> Vec<SessionId> {
    events.iter().fold(Vec::new(), |mut acc, recorded| {
        match &recorded.event {
            BookmarkEvent::Bookmarked {
                user_id: u,
                session_id,
            } if u == user_id => acc.push(session_id.clone()),
            BookmarkEvent::Unbookmarked {
                user_id: u,
                session_id,
            } if u == user_id => acc.retain(|s| s != session_id),
            _ => {}
        }
        acc
    })
}
