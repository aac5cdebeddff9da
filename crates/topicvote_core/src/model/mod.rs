//! Domain model for votable topics.
//!
//! # Responsibility
//! - Define topic and voter records shared by store, services and API.
//! - Keep rating aggregation next to the data it aggregates.
//!
//! # Invariants
//! - Every topic is identified by a stable `TopicId`.
//! - Voters have no identity outside their parent topic.

pub mod topic;
