//! Voting use-case service.
//!
//! # Responsibility
//! - Enforce one vote per national identifier per topic.
//! - Persist each vote together with the recomputed average.
//!
//! # Invariants
//! - Preconditions run in a fixed order: identifier length, rating range,
//!   topic existence, duplicate check. The first failure wins.
//! - A rejected vote leaves the store untouched.
//! - National identifiers are never written to logs.

use crate::model::topic::{
    validate_national_id, validate_rating, TopicId, TopicValidationError, Voter,
};
use crate::repo::topic_repo::{RepoError, TopicRepository};
use crate::service::ErrorKind;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of an accepted vote.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub topic_id: TopicId,
    /// Average rating after this vote.
    pub new_average: f64,
    /// Number of voters after this vote.
    pub voter_count: usize,
}

/// Errors from vote submission.
#[derive(Debug)]
pub enum VoteServiceError {
    /// National identifier does not have the required length.
    InvalidNationalId { length: usize },
    /// Rating is outside the accepted range.
    RatingOutOfRange(i64),
    /// Target topic does not exist.
    TopicNotFound(TopicId),
    /// Identifier already voted on this topic.
    DuplicateVote(TopicId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl VoteServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidNationalId { .. } | Self::RatingOutOfRange(_) => ErrorKind::Validation,
            Self::TopicNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateVote(_) => ErrorKind::DuplicateVote,
            Self::Repo(_) => ErrorKind::StoreFailure,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    fn from_repo(topic_id: TopicId, err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => Self::TopicNotFound(id),
            RepoError::Validation(TopicValidationError::DuplicateVoter) => {
                Self::DuplicateVote(topic_id)
            }
            RepoError::Validation(other) => Self::from(other),
            other => Self::Repo(other),
        }
    }
}

impl From<TopicValidationError> for VoteServiceError {
    fn from(value: TopicValidationError) -> Self {
        match value {
            TopicValidationError::InvalidNationalId { length } => {
                Self::InvalidNationalId { length }
            }
            TopicValidationError::RatingOutOfRange(rating) => Self::RatingOutOfRange(rating),
            other => Self::Repo(RepoError::Validation(other)),
        }
    }
}

impl Display for VoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNationalId { length } => write!(
                f,
                "{}",
                TopicValidationError::InvalidNationalId { length: *length }
            ),
            Self::RatingOutOfRange(rating) => write!(
                f,
                "{}",
                TopicValidationError::RatingOutOfRange(*rating)
            ),
            Self::TopicNotFound(id) => write!(f, "topic not found: {id}"),
            Self::DuplicateVote(id) => write!(f, "duplicate vote on topic {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

/// Vote submission facade over a repository.
pub struct VoteService<R: TopicRepository> {
    repo: R,
}

impl<R: TopicRepository> VoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Casts one vote and returns the topic's new average.
    pub fn cast_vote(
        &mut self,
        topic_id: TopicId,
        national_id: impl Into<String>,
        rating: i64,
    ) -> Result<VoteReceipt, VoteServiceError> {
        let voter = Voter::new(national_id, rating);
        if let Err(err) = validate_national_id(&voter.national_id)
            .and_then(|()| validate_rating(voter.rating))
        {
            warn!("event=vote_submit module=service status=rejected topic_id={topic_id} reason={err}");
            return Err(err.into());
        }

        match self.repo.record_vote(topic_id, &voter) {
            Ok(topic) => {
                info!(
                    "event=vote_submit module=service status=ok topic_id={} voter_count={} rating={:.3}",
                    topic_id,
                    topic.voters.len(),
                    topic.rating
                );
                Ok(VoteReceipt {
                    topic_id,
                    new_average: topic.rating,
                    voter_count: topic.voters.len(),
                })
            }
            Err(err) => {
                let err = VoteServiceError::from_repo(topic_id, err);
                warn!(
                    "event=vote_submit module=service status=rejected topic_id={topic_id} code={}",
                    err.code()
                );
                Err(err)
            }
        }
    }
}
