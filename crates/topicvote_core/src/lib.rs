//! Core domain logic for topic voting.
//! This crate is the single source of truth for topic and vote invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;
pub mod validation;
pub mod window;

pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::topic::{Topic, TopicId, TopicValidationError, Voter, NATIONAL_ID_LEN};
pub use repo::topic_repo::{
    RepoError, RepoResult, SqliteTopicRepository, TopicDatesPatch, TopicListQuery, TopicOrder,
    TopicRepository,
};
pub use service::topic_service::{ListPolicy, NewTopicRequest, TopicService, TopicServiceError};
pub use service::vote_service::{VoteReceipt, VoteService, VoteServiceError};
pub use service::ErrorKind;
pub use session::{ExpiryHandle, Session, SessionManager, StoredSession};
pub use validation::Validator;
pub use window::{TopicFilter, TopicWindow};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
