//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into topic lifecycle and voting use-cases.
//! - Map storage outcomes onto the caller-facing error taxonomy.

pub mod topic_service;
pub mod vote_service;

/// Caller-facing failure category shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or semantically invalid input.
    Validation,
    /// Unknown identifier or empty strict listing.
    NotFound,
    /// Identifier already voted on the topic.
    DuplicateVote,
    /// Persistence unavailable or errored.
    StoreFailure,
}

impl ErrorKind {
    /// HTTP-analogous status code for this category.
    pub fn code(self) -> u16 {
        match self {
            Self::Validation | Self::DuplicateVote => 422,
            Self::NotFound => 404,
            Self::StoreFailure => 500,
        }
    }
}
