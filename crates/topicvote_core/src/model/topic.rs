//! Topic domain model.
//!
//! # Responsibility
//! - Define the canonical topic record and its embedded voter registry.
//! - Enforce creation rules and per-topic vote uniqueness.
//! - Recompute the running average on every accepted vote.
//!
//! # Invariants
//! - `id` is stable and never reused for another topic.
//! - `end_date >= start_date` when a topic is created.
//! - A `national_id` appears at most once in `voters`.
//! - `rating` equals the arithmetic mean of `voters[].rating`, or 0 when empty.

use crate::validation::{first_failure, Validator};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a topic.
pub type TopicId = Uuid;

/// Required length of a voter national identifier.
pub const NATIONAL_ID_LEN: usize = 14;
/// Lowest accepted vote rating.
pub const MIN_RATING: i64 = 0;
/// Highest accepted vote rating.
pub const MAX_RATING: i64 = 5;

/// Rules applied to `Topic::title`.
pub const TITLE_RULES: &[Validator] = &[Validator::Required];
/// Rules applied to `Topic::description`.
pub const DESCRIPTION_RULES: &[Validator] = &[Validator::MinLength(5)];

/// One vote cast on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    /// Fixed-length national identifier of the voter.
    pub national_id: String,
    /// Rating in `[MIN_RATING, MAX_RATING]`.
    pub rating: i64,
}

impl Voter {
    pub fn new(national_id: impl Into<String>, rating: i64) -> Self {
        Self {
            national_id: national_id.into(),
            rating,
        }
    }

    /// Checks identifier length first, then rating range.
    pub fn validate(&self) -> Result<(), TopicValidationError> {
        validate_national_id(&self.national_id)?;
        validate_rating(self.rating)
    }
}

/// Canonical record for a time-boxed votable subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Mean of all voter ratings; 0 until the first vote.
    pub rating: f64,
    /// Voters in submission order.
    pub voters: Vec<Voter>,
}

impl Topic {
    /// Creates a topic with a generated id, no voters and rating 0.
    ///
    /// Does not validate; call `validate()` before persisting.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), title, description, start_date, end_date)
    }

    /// Creates a topic with a caller-provided id.
    pub fn with_id(
        id: TopicId,
        title: impl Into<String>,
        description: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            start_date,
            end_date,
            rating: 0.0,
            voters: Vec::new(),
        }
    }

    /// Validates creation rules: title, description, then date order.
    pub fn validate(&self) -> Result<(), TopicValidationError> {
        if first_failure(&self.title, TITLE_RULES).is_some() {
            return Err(TopicValidationError::EmptyTitle);
        }
        if let Some(Validator::MinLength(min)) = first_failure(&self.description, DESCRIPTION_RULES)
        {
            return Err(TopicValidationError::DescriptionTooShort {
                min,
                actual: self.description.trim().chars().count(),
            });
        }
        if self.end_date < self.start_date {
            return Err(TopicValidationError::EndBeforeStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Returns whether `national_id` already voted on this topic.
    pub fn has_voter(&self, national_id: &str) -> bool {
        self.voters
            .iter()
            .any(|voter| voter.national_id == national_id)
    }

    /// Appends one vote and recomputes `rating`.
    ///
    /// Returns the new average. Leaves the topic untouched on error.
    pub fn record_vote(&mut self, voter: Voter) -> Result<f64, TopicValidationError> {
        voter.validate()?;
        if self.has_voter(&voter.national_id) {
            return Err(TopicValidationError::DuplicateVoter);
        }
        self.voters.push(voter);
        self.rating = average_rating(&self.voters);
        Ok(self.rating)
    }

    /// UTC calendar day of `start_date`.
    pub fn start_day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    /// UTC calendar day of `end_date`.
    pub fn end_day(&self) -> NaiveDate {
        self.end_date.date_naive()
    }
}

/// Arithmetic mean of voter ratings, 0 for an empty slice.
pub fn average_rating(voters: &[Voter]) -> f64 {
    if voters.is_empty() {
        return 0.0;
    }
    let total: i64 = voters.iter().map(|voter| voter.rating).sum();
    total as f64 / voters.len() as f64
}

pub fn validate_national_id(national_id: &str) -> Result<(), TopicValidationError> {
    let length = national_id.chars().count();
    if length != NATIONAL_ID_LEN {
        return Err(TopicValidationError::InvalidNationalId { length });
    }
    Ok(())
}

pub fn validate_rating(rating: i64) -> Result<(), TopicValidationError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(TopicValidationError::RatingOutOfRange(rating));
    }
    Ok(())
}

/// Rule violations for topic and voter records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicValidationError {
    /// Title is blank after trim.
    EmptyTitle,
    /// Description is shorter than the minimum after trim.
    DescriptionTooShort { min: usize, actual: usize },
    /// End date precedes start date.
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// National identifier has the wrong length.
    InvalidNationalId { length: usize },
    /// Rating is outside `[MIN_RATING, MAX_RATING]`.
    RatingOutOfRange(i64),
    /// The identifier already voted on this topic.
    DuplicateVoter,
    /// Replacement start date is not strictly after the update instant.
    StartNotInFuture { start: DateTime<Utc> },
    /// Replacement end date is not strictly after the update instant.
    EndNotInFuture { end: DateTime<Utc> },
}

impl Display for TopicValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::DescriptionTooShort { min, actual } => write!(
                f,
                "description must be at least {min} characters, got {actual}"
            ),
            Self::EndBeforeStart { start, end } => write!(
                f,
                "end date {} is earlier than start date {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            ),
            Self::InvalidNationalId { length } => write!(
                f,
                "national id must be {NATIONAL_ID_LEN} characters, got {length}"
            ),
            Self::RatingOutOfRange(rating) => write!(
                f,
                "rating {rating} is outside [{MIN_RATING}, {MAX_RATING}]"
            ),
            Self::DuplicateVoter => write!(f, "national id already voted on this topic"),
            Self::StartNotInFuture { start } => write!(
                f,
                "start date {} must be in the future for extension",
                start.to_rfc3339()
            ),
            Self::EndNotInFuture { end } => write!(
                f,
                "end date {} must be in the future for extension",
                end.to_rfc3339()
            ),
        }
    }
}

impl Error for TopicValidationError {}
