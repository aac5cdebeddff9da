//! Transport-agnostic request surface for topic voting.
//!
//! Callers (CLI, HTTP adapters) hand in raw JSON payloads and receive a
//! status code plus JSON body.

pub mod api;
pub mod config;

pub use api::{parse_instant, ApiError, ApiResponse, TopicApi};
pub use config::{ApiConfig, ConfigError};
