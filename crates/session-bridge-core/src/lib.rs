//! Session Bridge Core Library
//!
//! This crate provides a persistent, thread-safe bidirectional index between
//! session identifiers of one agent runtime and agent names of another:
//! - SQLite-based persistence with versioned schema migrations
//! - Pooled, per-caller connections in WAL mode
//! - The mapping service (create, lookups, status updates, staleness sweep)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   session-bridge-core                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  bridge/       - Mapping service (domain rules)             │
//! │  storage/      - SQLite pool, migrations, queries           │
//! │  types/        - Mapping, status, cleanup report            │
//! │  config.rs     - Storage configuration                      │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result, StorageError};
pub use types::*;

pub use bridge::MappingService;
pub use config::StorageConfig;
pub use storage::Storage;
