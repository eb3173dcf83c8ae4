//! Command dispatch
//!
//! Each subcommand maps onto one mapping service call and produces a single
//! JSON object. A missing mapping is reported as data (an `error` field),
//! never as a failure.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use session_bridge_core::bridge::{validate_id, validate_max_age, validate_target_status};
use session_bridge_core::config::DB_PATH_ENV;
use session_bridge_core::{Error, MappingService, MappingStatus, Metadata, Result, StorageConfig};
use std::path::PathBuf;
use tracing::error;

pub const NOT_FOUND_MESSAGE: &str = "No active mapping found";

/// Session bridge: session <-> agent mapping store
#[derive(Parser, Debug)]
#[command(name = "session-bridge", version, about)]
pub struct Cli {
    /// Path to the mapping database
    #[arg(long, global = true, env = DB_PATH_ENV)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new mapping
    Create {
        #[arg(long)]
        session_id: String,

        #[arg(long)]
        agent_name: String,

        /// JSON object stored alongside the mapping
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Get the agent mapped to a session
    #[command(visible_alias = "get-agent")]
    GetAgentForSession {
        #[arg(long)]
        session_id: String,
    },

    /// Get the session mapped to an agent
    #[command(visible_alias = "get-session")]
    GetSessionForAgent {
        #[arg(long)]
        agent_name: String,
    },

    /// List active mappings, newest first
    List,

    /// Move a session's active mapping to completed, failed or stale
    UpdateStatus {
        #[arg(long)]
        session_id: String,

        #[arg(long)]
        status: MappingStatus,
    },

    /// Mark active mappings older than the given age as stale
    Cleanup {
        /// Max age in hours
        #[arg(
            long,
            visible_alias = "max-age",
            default_value_t = 24.0,
            allow_negative_numbers = true
        )]
        max_age_hours: f64,
    },

    /// Count mappings by status
    Stats,
}

impl Command {
    /// Check arguments without touching storage
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Create {
                session_id,
                agent_name,
                metadata,
            } => {
                validate_id("sessionID", session_id)?;
                validate_id("agentName", agent_name)?;
                if let Some(raw) = metadata {
                    parse_metadata(raw)?;
                }
                Ok(())
            }
            Command::GetAgentForSession { session_id } => validate_id("sessionID", session_id),
            Command::GetSessionForAgent { agent_name } => validate_id("agentName", agent_name),
            Command::UpdateStatus { session_id, status } => {
                validate_id("sessionID", session_id)?;
                validate_target_status(*status)
            }
            Command::Cleanup { max_age_hours } => validate_max_age(*max_age_hours),
            Command::List | Command::Stats => Ok(()),
        }
    }
}

/// JSON result of one invocation and the process exit code to report
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub body: Value,
    pub exit_code: u8,
}

impl Outcome {
    fn success(body: Value) -> Self {
        Self { body, exit_code: 0 }
    }

    fn failure(message: impl std::fmt::Display) -> Self {
        Self {
            body: error_body(message),
            exit_code: 1,
        }
    }
}

/// Validate, open the store and run one command.
///
/// Invalid arguments fail before the database is opened, so they never
/// create or touch the store file.
pub fn execute(cli: Cli) -> Outcome {
    if let Err(err) = cli.command.validate() {
        error!("{}", err);
        return Outcome::failure(err);
    }

    let config = match cli.db {
        Some(path) => StorageConfig::default().with_db_path(path),
        None => StorageConfig::from_env(),
    };

    let result = MappingService::open(&config)
        .with_context(|| format!("failed to open mapping store at {:?}", config.db_path))
        .and_then(|service| Ok(run_command(&service, cli.command)?));

    match result {
        Ok(body) => Outcome::success(body),
        Err(err) => {
            error!("{:#}", err);
            Outcome::failure(format!("{:#}", err))
        }
    }
}

/// Run a command against the service and build its JSON result.
pub fn run_command(service: &MappingService, command: Command) -> Result<Value> {
    match command {
        Command::Create {
            session_id,
            agent_name,
            metadata,
        } => {
            let metadata = metadata.as_deref().map(parse_metadata).transpose()?;
            let mapping = service.create_mapping(&session_id, &agent_name, metadata)?;
            Ok(serde_json::to_value(mapping.summary())?)
        }
        Command::GetAgentForSession { session_id } => {
            match service.get_agent_for_session(&session_id)? {
                Some(mapping) => Ok(serde_json::to_value(mapping)?),
                None => Ok(json!({ "error": NOT_FOUND_MESSAGE, "sessionID": session_id })),
            }
        }
        Command::GetSessionForAgent { agent_name } => {
            match service.get_session_for_agent(&agent_name)? {
                Some(mapping) => Ok(serde_json::to_value(mapping)?),
                None => Ok(json!({ "error": NOT_FOUND_MESSAGE, "agentName": agent_name })),
            }
        }
        Command::List => {
            let mappings = service.list_active_mappings()?;
            Ok(json!({ "mappings": mappings }))
        }
        Command::UpdateStatus { session_id, status } => {
            let updated = service.update_status(&session_id, status)?;
            Ok(json!({ "sessionID": session_id, "status": status, "updated": updated }))
        }
        Command::Cleanup { max_age_hours } => {
            let report = service.cleanup_stale(max_age_hours)?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Stats => {
            let mut counts = Map::new();
            for status in [
                MappingStatus::Active,
                MappingStatus::Completed,
                MappingStatus::Failed,
                MappingStatus::Stale,
            ] {
                counts.insert(status.to_string(), json!(0));
            }
            let mut total = 0;
            for (status, count) in service.status_counts()? {
                counts.insert(status.to_string(), json!(count));
                total += count;
            }
            Ok(json!({ "counts": counts, "total": total }))
        }
    }
}

/// JSON body printed when a command fails
pub fn error_body(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

fn parse_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| Error::validation(format!("metadata must be a JSON object: {}", e)))
}
