//! Event-sourced core of the speaker-to-speaker conference app.
//!
//! Three append-only ledgers — speaker program, attendee feedback, and
//! bookmarks — are the single source of truth. All reads replay a ledger
//! through the pure folds in [`projection`]; all writes go through the
//! command handlers in [`commands`], which validate against the replayed
//! state and append with optimistic concurrency.
//!
//! The crate is I/O-free: storage and conference content arrive through the
//! [`event_log::EventLog`] and [`content::ContentSource`] traits. See
//! `s2s-testing` for deterministic implementations, `s2s-postgres` for the
//! durable store, and `s2s-sessionize` for the schedule client.

pub mod commands;
pub mod content;
pub mod environment;
pub mod event;
pub mod event_log;
pub mod feedback;
pub mod ids;
pub mod projection;

pub use commands::{
    Actor, AttendeeCommands, BookmarkCommands, CommandError, DomainError, Role, SpeakerCommands,
    MAX_ASSIGNEES_PER_SESSION, MAX_ASSIGNMENTS_PER_SPEAKER,
};
pub use content::{ContentError, ContentSource, Session, home_session};
pub use environment::{Clock, SystemClock};
pub use event::{AttendeeEvent, BookmarkEvent, Event, EventError, Rating, Recorded, SpeakerEvent};
pub use event_log::{EventLog, StoreError, version_of};
pub use feedback::{FeedbackError, SpeakerFeedbackForm};
pub use ids::{SessionId, SpeakerId, UserId, Version};
