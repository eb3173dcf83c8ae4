//! Session/agent mapping service
//!
//! All business rules about mappings live here: recency tie-breaks,
//! one-way status transitions and the staleness cutoff.

mod service;

pub use service::{validate_id, validate_max_age, validate_target_status, MappingService};
