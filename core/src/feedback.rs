//! Speaker peer-feedback form and its structural validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for a [`SpeakerFeedbackForm`].
///
/// These are expected, recoverable outcomes surfaced to the submitting
/// speaker, not faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedbackError {
    /// The rating is outside the 1..=5 scale.
    #[error("Rating must be between 1 and 5")]
    RatingOutOfRange,

    /// A required free-text field is empty (after trimming).
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),
}

/// The peer-feedback form a speaker submits for a reviewed session.
///
/// Submissions are append-only: a re-submission appends a fresh
/// `FeedbackSubmitted` event and the latest one wins at replay. The form is
/// validated structurally before any event is appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerFeedbackForm {
    /// Overall session rating, 1 (lowest) to 5 (highest).
    pub rating: u8,
    /// Why the reviewer chose to attend this session.
    pub why: String,
    /// The reviewer's favorite thing about the session.
    pub fav: String,
    /// One thing the speaker could improve.
    pub improve: String,
    /// Any other comments for the speaker.
    pub comments: String,
}

impl SpeakerFeedbackForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule: [`FeedbackError::RatingOutOfRange`]
    /// when the rating is outside 1..=5, or [`FeedbackError::EmptyField`]
    /// naming the first empty free-text field.
    pub fn validate(&self) -> Result<(), FeedbackError> {
        if !(1..=5).contains(&self.rating) {
            return Err(FeedbackError::RatingOutOfRange);
        }

        for (name, value) in [
            ("why", &self.why),
            ("fav", &self.fav),
            ("improve", &self.improve),
            ("comments", &self.comments),
        ] {
            if value.trim().is_empty() {
                return Err(FeedbackError::EmptyField(name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> SpeakerFeedbackForm {
        SpeakerFeedbackForm {
            rating: 4,
            why: "Topic overlaps with my own talk".to_string(),
            fav: "The live demo".to_string(),
            improve: "Slides were dense".to_string(),
            comments: "Great energy".to_string(),
        }
    }

    #[test]
    fn valid_form_passes() {
        assert_eq!(valid_form().validate(), Ok(()));
    }

    #[test]
    fn rating_bounds() {
        let mut form = valid_form();
        form.rating = 0;
        assert_eq!(form.validate(), Err(FeedbackError::RatingOutOfRange));
        form.rating = 6;
        assert_eq!(form.validate(), Err(FeedbackError::RatingOutOfRange));
        form.rating = 1;
        assert_eq!(form.validate(), Ok(()));
        form.rating = 5;
        assert_eq!(form.validate(), Ok(()));
    }

    #[test]
    fn whitespace_only_field_rejected() {
        let mut form = valid_form();
        form.improve = "   ".to_string();
        assert_eq!(form.validate(), Err(FeedbackError::EmptyField("improve")));
    }

    #[test]
    fn first_empty_field_is_reported() {
        let mut form = valid_form();
        form.why = String::new();
        form.comments = String::new();
        assert_eq!(form.validate(), Err(FeedbackError::EmptyField("why")));
    }
}
