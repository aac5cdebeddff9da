//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the topic store contract used by lifecycle and voting services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce model validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to DB transport errors.

pub mod topic_repo;
