//! Topic lifecycle use-case service.
//!
//! # Responsibility
//! - Sanitize and validate topic input before it reaches the store.
//! - Serve filtered listings through the date-window classifier.
//! - Pass store outcomes through as lifecycle errors.
//!
//! # Invariants
//! - Creation never persists a topic whose end precedes its start.
//! - Date extensions only accept instants strictly after the clock's `now`.
//! - Window listings are computed against the clock's UTC calendar day.

use crate::clock::Clock;
use crate::model::topic::{Topic, TopicId, TopicValidationError};
use crate::repo::topic_repo::{
    RepoError, TopicDatesPatch, TopicListQuery, TopicOrder, TopicRepository,
};
use crate::service::ErrorKind;
use crate::window::{apply_filter, TopicFilter};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How an empty listing is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListPolicy {
    /// Empty result is a normal, successful outcome.
    #[default]
    EmptyIsOk,
    /// Empty result is reported as `NoTopicsFound`.
    EmptyIsNotFound,
}

/// Input for creating one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopicRequest {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Errors from topic lifecycle operations.
#[derive(Debug)]
pub enum TopicServiceError {
    /// Input violates a topic rule.
    InvalidInput(TopicValidationError),
    /// Target topic does not exist.
    TopicNotFound(TopicId),
    /// Listing came back empty under `ListPolicy::EmptyIsNotFound`.
    NoTopicsFound,
    /// Write succeeded but read-back disagrees.
    InconsistentState(&'static str),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl TopicServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::TopicNotFound(_) | Self::NoTopicsFound => ErrorKind::NotFound,
            Self::InconsistentState(_) | Self::Repo(_) => ErrorKind::StoreFailure,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().code()
    }
}

impl Display for TopicServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::TopicNotFound(id) => write!(f, "topic not found: {id}"),
            Self::NoTopicsFound => write!(f, "no topics found"),
            Self::InconsistentState(details) => write!(f, "inconsistent topic state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TopicServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TopicServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TopicNotFound(id),
            RepoError::Validation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TopicValidationError> for TopicServiceError {
    fn from(value: TopicValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

/// Topic lifecycle facade over a repository and a clock.
pub struct TopicService<R: TopicRepository, C: Clock> {
    repo: R,
    clock: C,
    list_policy: ListPolicy,
}

impl<R: TopicRepository, C: Clock> TopicService<R, C> {
    /// Creates a service with the default (`EmptyIsOk`) listing policy.
    pub fn new(repo: R, clock: C) -> Self {
        Self {
            repo,
            clock,
            list_policy: ListPolicy::default(),
        }
    }

    pub fn with_list_policy(mut self, list_policy: ListPolicy) -> Self {
        self.list_policy = list_policy;
        self
    }

    /// Creates one topic with no voters and rating 0.
    ///
    /// Title and description are trimmed before validation and storage.
    pub fn create_topic(&self, request: NewTopicRequest) -> Result<Topic, TopicServiceError> {
        let topic = Topic::new(
            request.title.trim(),
            request.description.trim(),
            request.start_date,
            request.end_date,
        );
        if let Err(err) = topic.validate() {
            warn!("event=topic_create module=service status=rejected reason={err}");
            return Err(err.into());
        }

        let id = self.repo.create_topic(&topic)?;
        info!("event=topic_create module=service status=ok topic_id={id}");
        self.repo
            .get_topic(id)?
            .ok_or(TopicServiceError::InconsistentState(
                "created topic not found in read-back",
            ))
    }

    /// Gets one topic by id.
    pub fn get_topic(&self, id: TopicId) -> Result<Topic, TopicServiceError> {
        self.repo
            .get_topic(id)?
            .ok_or(TopicServiceError::TopicNotFound(id))
    }

    /// Lists topics for an optional filter key.
    ///
    /// Recognized window keys classify the full topic set against today's
    /// date; any other key lists every topic by `start_date` descending.
    pub fn list_topics(&self, filter: Option<&str>) -> Result<Vec<Topic>, TopicServiceError> {
        let filter = TopicFilter::parse(filter);
        let topics = match filter {
            TopicFilter::All => self.repo.list_topics(&TopicListQuery {
                order: TopicOrder::StartDateDesc,
                ..TopicListQuery::default()
            })?,
            TopicFilter::Window(_) => {
                let all = self.repo.list_topics(&TopicListQuery::default())?;
                apply_filter(all, filter, self.clock.today())
            }
        };

        if topics.is_empty() && self.list_policy == ListPolicy::EmptyIsNotFound {
            return Err(TopicServiceError::NoTopicsFound);
        }
        Ok(topics)
    }

    /// Extends a topic's dates; supplied dates must be strictly in the future.
    pub fn update_topic(
        &mut self,
        id: TopicId,
        patch: &TopicDatesPatch,
    ) -> Result<Topic, TopicServiceError> {
        let now = self.clock.now();
        match self.repo.update_topic_dates(id, patch, now) {
            Ok(topic) => {
                info!("event=topic_update module=service status=ok topic_id={id}");
                Ok(topic)
            }
            Err(err) => {
                warn!("event=topic_update module=service status=error topic_id={id} error={err}");
                Err(err.into())
            }
        }
    }

    /// Permanently deletes a topic and its voters.
    pub fn delete_topic(&self, id: TopicId) -> Result<(), TopicServiceError> {
        self.repo.delete_topic(id)?;
        info!("event=topic_delete module=service status=ok topic_id={id}");
        Ok(())
    }
}
