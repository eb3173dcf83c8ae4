//! Mapping service implementation

use crate::config::StorageConfig;
use crate::error::{Error, Result, StorageError};
use crate::storage::{self, Storage};
use crate::types::*;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::{debug, info};

/// Domain API over the mapping store
///
/// The service is an ordinary value: construct it once and share it by
/// reference (or behind an `Arc`) between threads. Each call checks out its
/// own pooled connection for the duration of the call.
pub struct MappingService {
    storage: Storage,
}

impl MappingService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Open the store described by `config` and wrap it in a service
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(Storage::open(config)?))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Record a new active mapping between a session and an agent.
    ///
    /// Always inserts, even when an active mapping already exists for either
    /// identifier; lookups then resolve to the newest row.
    pub fn create_mapping(
        &self,
        session_id: &str,
        agent_name: &str,
        metadata: Option<Metadata>,
    ) -> Result<SessionMapping> {
        validate_id("sessionID", session_id)?;
        validate_id("agentName", agent_name)?;

        let new = NewMapping {
            session_id: session_id.to_string(),
            agent_name: agent_name.to_string(),
            created_at: now(),
            metadata: metadata.unwrap_or_default(),
        };

        let conn = self.storage.connection()?;
        let id = storage::insert_mapping(&conn, &new)?;
        let mapping = storage::get_mapping(&conn, id)?.ok_or_else(|| {
            StorageError::Database(format!("mapping {} missing after insert", id))
        })?;

        info!("Mapped session:{} <-> agent:{} (id={})", session_id, agent_name, id);

        Ok(mapping)
    }

    /// Newest active mapping for a session, if any
    pub fn get_agent_for_session(&self, session_id: &str) -> Result<Option<SessionMapping>> {
        validate_id("sessionID", session_id)?;

        let conn = self.storage.connection()?;
        let found = storage::find_active_by_session(&conn, session_id)?;
        debug!("Lookup session:{} -> {:?}", session_id, found.as_ref().map(|m| &m.agent_name));
        Ok(found)
    }

    /// Newest active mapping for an agent, if any
    pub fn get_session_for_agent(&self, agent_name: &str) -> Result<Option<SessionMapping>> {
        validate_id("agentName", agent_name)?;

        let conn = self.storage.connection()?;
        let found = storage::find_active_by_agent(&conn, agent_name)?;
        debug!("Lookup agent:{} -> {:?}", agent_name, found.as_ref().map(|m| &m.session_id));
        Ok(found)
    }

    /// All active mappings, newest first
    pub fn list_active_mappings(&self) -> Result<Vec<SessionMapping>> {
        let conn = self.storage.connection()?;
        storage::list_active_mappings(&conn)
    }

    /// Move the active mapping(s) of a session to a terminal status.
    ///
    /// Returns `false` when the session has no active mapping. Transitions only
    /// leave `active`, so `active` itself is rejected as a target.
    pub fn update_status(&self, session_id: &str, status: MappingStatus) -> Result<bool> {
        validate_id("sessionID", session_id)?;
        validate_target_status(status)?;

        let conn = self.storage.connection()?;
        let changed = storage::update_active_status(&conn, session_id, status, &now())?;

        let updated = changed > 0;
        if updated {
            info!("Updated session:{} -> status={}", session_id, status);
        } else {
            debug!("No active mapping for session:{}; status unchanged", session_id);
        }
        Ok(updated)
    }

    /// Retire every active mapping created more than `max_age_hours` ago.
    ///
    /// The sweep is one set-based statement; running it again with no new
    /// activity reports zero.
    pub fn cleanup_stale(&self, max_age_hours: f64) -> Result<CleanupReport> {
        validate_max_age(max_age_hours)?;

        let now = now();
        let cutoff = cutoff_for(now, max_age_hours);

        let conn = self.storage.connection()?;
        let stale_count = storage::mark_stale_before(&conn, &cutoff, &now)?;

        info!("Marked {} stale mappings (older than {:.1}h)", stale_count, max_age_hours);

        Ok(CleanupReport {
            stale_count,
            max_age_hours,
        })
    }

    /// Number of rows in each status, including terminal history
    pub fn status_counts(&self) -> Result<Vec<(MappingStatus, i64)>> {
        let conn = self.storage.connection()?;
        storage::count_by_status(&conn)
    }
}

/// Reject empty or whitespace-only identifiers
pub fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Status updates only move mappings out of `active`
pub fn validate_target_status(status: MappingStatus) -> Result<()> {
    if !status.is_terminal() {
        return Err(Error::validation(format!(
            "cannot transition a mapping to '{}'",
            status
        )));
    }
    Ok(())
}

pub fn validate_max_age(max_age_hours: f64) -> Result<()> {
    if !max_age_hours.is_finite() || max_age_hours < 0.0 {
        return Err(Error::validation(format!(
            "maxAgeHours must be a non-negative number, got {}",
            max_age_hours
        )));
    }
    Ok(())
}

// Stored timestamps keep microseconds
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn cutoff_for(now: DateTime<Utc>, max_age_hours: f64) -> DateTime<Utc> {
    let age = Duration::microseconds((max_age_hours * 3_600_000_000.0) as i64);
    now.checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
