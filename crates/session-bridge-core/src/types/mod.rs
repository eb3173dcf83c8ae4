//! Core type definitions for Session Bridge
//!
//! The mapping record, its lifecycle status, and the results returned by
//! the mapping service.

mod mapping_types;

pub use mapping_types::*;
