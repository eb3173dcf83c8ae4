//! Session Bridge command-line surface
//!
//! Translates named actions into mapping service calls and renders each
//! result as one JSON object.

pub mod commands;

pub use commands::{error_body, execute, run_command, Cli, Command, Outcome};
