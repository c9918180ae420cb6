//! Command-handler tests for the attendee-feedback and bookmark ledgers.

#![allow(clippy::unwrap_used, clippy::panic)]

use s2s_core::commands::{Actor, AttendeeCommands, BookmarkCommands, CommandError, DomainError, Role};
use s2s_core::event::{AttendeeEvent, BookmarkEvent, Rating};
use s2s_core::event_log::EventLog;
use s2s_core::ids::{SessionId, UserId};
use s2s_core::projection;
use s2s_testing::InMemoryEventLog;
use std::sync::Arc;

fn user(id: &str) -> UserId {
    UserId::new(id)
}

fn se(id: &str) -> SessionId {
    SessionId::new(id)
}

fn attendee_handler() -> (AttendeeCommands, Arc<InMemoryEventLog<AttendeeEvent>>) {
    let log = Arc::new(InMemoryEventLog::default());
    (AttendeeCommands::new(log.clone()), log)
}

fn bookmark_handler() -> (BookmarkCommands, Arc<InMemoryEventLog<BookmarkEvent>>) {
    let log = Arc::new(InMemoryEventLog::default());
    (BookmarkCommands::new(log.clone()), log)
}

fn domain_err<T: std::fmt::Debug>(result: Result<T, CommandError>) -> DomainError {
    match result {
        Err(CommandError::Domain(error)) => error,
        other => panic!("expected domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn rating_and_review_are_last_wins() {
    let (commands, log) = attendee_handler();

    commands.rate(&user("u-1"), &se("s-1"), Rating::Poor).await.unwrap();
    commands
        .review(&user("u-1"), &se("s-1"), "decent".to_string())
        .await
        .unwrap();
    commands.rate(&user("u-1"), &se("s-1"), Rating::Great).await.unwrap();

    let history = log.read_all().await.unwrap();
    assert_eq!(history.len(), 3);

    let current = projection::attendee_feedback(&history, &user("u-1"), &se("s-1"));
    assert_eq!(current.rating, Some(Rating::Great));
    assert_eq!(current.review.as_deref(), Some("decent"));
}

#[tokio::test]
async fn empty_review_is_rejected() {
    let (commands, log) = attendee_handler();

    let error = domain_err(commands.review(&user("u-1"), &se("s-1"), "  ".to_string()).await);
    assert!(matches!(error, DomainError::InvalidFeedback(_)));
    assert!(log.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn approval_commands_are_admin_only() {
    let (commands, log) = attendee_handler();
    let attendee = Actor::new("u-2", Role::Attendee);

    let error = domain_err(commands.approve(&attendee, &user("u-1"), &se("s-1")).await);
    assert_eq!(error, DomainError::Unauthorized);
    let error = domain_err(commands.unapprove(&attendee, &user("u-1"), &se("s-1")).await);
    assert_eq!(error, DomainError::Unauthorized);
    let error = domain_err(commands.approve_all(&attendee).await);
    assert_eq!(error, DomainError::Unauthorized);

    assert!(log.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn approval_toggles_visibility() {
    let (commands, log) = attendee_handler();
    let admin = Actor::admin("admin-1");

    commands.rate(&user("u-1"), &se("s-1"), Rating::Good).await.unwrap();
    commands.approve(&admin, &user("u-1"), &se("s-1")).await.unwrap();

    let history = log.read_all().await.unwrap();
    assert!(projection::session_feedback(&history, &se("s-1"))[0].approved);
    assert!(projection::unapproved_feedback(&history).is_empty());

    commands.unapprove(&admin, &user("u-1"), &se("s-1")).await.unwrap();
    let history = log.read_all().await.unwrap();
    assert!(!projection::session_feedback(&history, &se("s-1"))[0].approved);
    assert_eq!(
        projection::unapproved_feedback(&history),
        vec![(user("u-1"), se("s-1"))]
    );
}

#[tokio::test]
async fn bulk_approval_covers_only_pending_pairs() {
    let (commands, log) = attendee_handler();
    let admin = Actor::admin("admin-1");

    commands.rate(&user("u-1"), &se("s-1"), Rating::Good).await.unwrap();
    commands.rate(&user("u-1"), &se("s-2"), Rating::Great).await.unwrap();
    commands
        .review(&user("u-2"), &se("s-1"), "insightful".to_string())
        .await
        .unwrap();
    commands.approve(&admin, &user("u-1"), &se("s-1")).await.unwrap();

    let batch = commands.approve_all(&admin).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|e| matches!(e, AttendeeEvent::Approved { .. })));

    let history = log.read_all().await.unwrap();
    assert!(projection::unapproved_feedback(&history).is_empty());

    // Nothing pending: the second run appends nothing.
    let batch = commands.approve_all(&admin).await.unwrap();
    assert!(batch.is_empty());
    assert_eq!(log.read_all().await.unwrap().len(), history.len());
}

#[tokio::test]
async fn bookmark_toggle_is_guarded_both_ways() {
    let (commands, log) = bookmark_handler();

    commands.bookmark(&user("u-1"), &se("s-1")).await.unwrap();
    let error = domain_err(commands.bookmark(&user("u-1"), &se("s-1")).await);
    assert_eq!(error.to_string(), "Session already bookmarked");

    commands.unbookmark(&user("u-1"), &se("s-1")).await.unwrap();
    let error = domain_err(commands.unbookmark(&user("u-1"), &se("s-1")).await);
    assert_eq!(error.to_string(), "Session not bookmarked");

    // Re-bookmarking after removal is allowed.
    commands.bookmark(&user("u-1"), &se("s-1")).await.unwrap();

    let history = log.read_all().await.unwrap();
    assert_eq!(
        projection::bookmarked_sessions(&history, &user("u-1")),
        vec![se("s-1")]
    );
}

#[tokio::test]
async fn bookmarks_are_per_user() {
    let (commands, log) = bookmark_handler();

    commands.bookmark(&user("u-1"), &se("s-1")).await.unwrap();
    commands.bookmark(&user("u-2"), &se("s-1")).await.unwrap();
    commands.unbookmark(&user("u-1"), &se("s-1")).await.unwrap();

    let history = log.read_all().await.unwrap();
    assert!(projection::bookmarked_sessions(&history, &user("u-1")).is_empty());
    assert_eq!(
        projection::bookmarked_sessions(&history, &user("u-2")),
        vec![se("s-1")]
    );
}
