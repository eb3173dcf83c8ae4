//! Session mapping types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-supplied side information, stored as an opaque JSON object
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Mapping lifecycle state
///
/// `Active` is the only non-terminal state. Once a mapping leaves it, the row
/// is never returned by a lookup or touched by an update or sweep again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    /// Mapping represents a live session/agent relationship
    Active,
    /// Agent finished its work
    Completed,
    /// Agent failed
    Failed,
    /// Retired by the staleness sweep
    Stale,
}

impl Default for MappingStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stale => "stale",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status string is not one of the known states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown status '{}' (expected active, completed, failed or stale)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for MappingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "stale" => Ok(Self::Stale),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMapping {
    /// Store-assigned row identity, never reused
    pub id: i64,
    /// Identifier in the calling runtime's session namespace
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Identifier in the target runtime's agent namespace
    pub agent_name: String,
    pub status: MappingStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SessionMapping {
    pub fn summary(&self) -> MappingSummary {
        MappingSummary {
            id: self.id,
            session_id: self.session_id.clone(),
            agent_name: self.agent_name.clone(),
            status: self.status,
        }
    }
}

/// Fields needed to insert a mapping row
#[derive(Debug, Clone)]
pub struct NewMapping {
    pub session_id: String,
    pub agent_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub metadata: Metadata,
}

/// Short form of a mapping reported after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub id: i64,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub agent_name: String,
    pub status: MappingStatus,
}

/// Outcome of a staleness sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Number of rows moved from active to stale
    pub stale_count: usize,
    pub max_age_hours: f64,
}
