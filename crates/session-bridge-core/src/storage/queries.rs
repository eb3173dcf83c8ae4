//! Database query implementations
//!
//! Every function issues a single statement, so each write either fully
//! applies or has no effect.

use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MAPPING_COLUMNS: &str =
    "id, session_id, agent_name, status, created_at, updated_at, metadata";

// ===== Mapping Queries =====

/// Insert a new active mapping, returning its row id
pub fn insert_mapping(conn: &Connection, mapping: &NewMapping) -> Result<i64> {
    let created_at = to_epoch_secs(&mapping.created_at);

    conn.execute(
        r#"
        INSERT INTO session_mappings
            (session_id, agent_name, status, created_at, updated_at, metadata)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            mapping.session_id,
            mapping.agent_name,
            MappingStatus::Active.as_str(),
            created_at,
            created_at,
            serde_json::to_string(&mapping.metadata)?,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Get a mapping by row id, whatever its status
pub fn get_mapping(conn: &Connection, id: i64) -> Result<Option<SessionMapping>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM session_mappings WHERE id = ?", MAPPING_COLUMNS),
            params![id],
            mapping_from_row,
        )
        .optional()?;

    Ok(result)
}

/// Newest active mapping for a session
pub fn find_active_by_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<SessionMapping>> {
    let result = conn
        .query_row(
            &format!(
                r#"
                SELECT {}
                FROM session_mappings
                WHERE session_id = ? AND status = 'active'
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                MAPPING_COLUMNS
            ),
            params![session_id],
            mapping_from_row,
        )
        .optional()?;

    Ok(result)
}

/// Newest active mapping for an agent
pub fn find_active_by_agent(
    conn: &Connection,
    agent_name: &str,
) -> Result<Option<SessionMapping>> {
    let result = conn
        .query_row(
            &format!(
                r#"
                SELECT {}
                FROM session_mappings
                WHERE agent_name = ? AND status = 'active'
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                MAPPING_COLUMNS
            ),
            params![agent_name],
            mapping_from_row,
        )
        .optional()?;

    Ok(result)
}

/// All active mappings, newest first
pub fn list_active_mappings(conn: &Connection) -> Result<Vec<SessionMapping>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {}
        FROM session_mappings
        WHERE status = 'active'
        ORDER BY created_at DESC, id DESC
        "#,
        MAPPING_COLUMNS
    ))?;

    let mappings = stmt
        .query_map([], mapping_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(mappings)
}

/// Move every active mapping of a session to `status`, returning the number of rows changed
pub fn update_active_status(
    conn: &Connection,
    session_id: &str,
    status: MappingStatus,
    updated_at: &DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        r#"
        UPDATE session_mappings
        SET status = ?, updated_at = ?
        WHERE session_id = ? AND status = 'active'
        "#,
        params![status.as_str(), to_epoch_secs(updated_at), session_id],
    )?;

    Ok(changed)
}

/// Mark every active mapping created before `cutoff` as stale in one statement
pub fn mark_stale_before(
    conn: &Connection,
    cutoff: &DateTime<Utc>,
    updated_at: &DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        r#"
        UPDATE session_mappings
        SET status = ?, updated_at = ?
        WHERE status = 'active' AND created_at < ?
        "#,
        params![
            MappingStatus::Stale.as_str(),
            to_epoch_secs(updated_at),
            to_epoch_secs(cutoff),
        ],
    )?;

    Ok(changed)
}

/// Count rows in each status
pub fn count_by_status(conn: &Connection) -> Result<Vec<(MappingStatus, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM session_mappings GROUP BY status ORDER BY status",
    )?;

    let counts = stmt
        .query_map([], |row| Ok((parse_status(row, 0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(counts)
}

// ===== Helper Functions =====

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<SessionMapping> {
    let metadata: String = row.get(6)?;

    Ok(SessionMapping {
        id: row.get(0)?,
        session_id: row.get(1)?,
        agent_name: row.get(2)?,
        status: parse_status(row, 3)?,
        created_at: parse_timestamp(row, 4)?,
        updated_at: parse_timestamp(row, 5)?,
        // Metadata is passthrough; an unreadable blob is reported as empty
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
    })
}

fn parse_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<MappingStatus> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: f64 = row.get(idx)?;
    from_epoch_secs(secs).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs as i64))
}

/// Seconds since the Unix epoch with microsecond precision
pub(crate) fn to_epoch_secs(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

pub(crate) fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round() as i64;
    let whole = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};
    use pretty_assertions::assert_eq;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::storage::run_migrations(&conn).unwrap();
        conn
    }

    fn new_mapping(session_id: &str, agent_name: &str, created_at: DateTime<Utc>) -> NewMapping {
        NewMapping {
            session_id: session_id.to_string(),
            agent_name: agent_name.to_string(),
            created_at,
            metadata: Metadata::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    #[test]
    fn test_mapping_crud() {
        let conn = setup_db();
        let created = now();

        let mut mapping = new_mapping("s1", "agent-a", created);
        mapping
            .metadata
            .insert("task".to_string(), serde_json::json!({"id": 42, "tags": ["x"]}));

        // Insert
        let id = insert_mapping(&conn, &mapping).unwrap();

        // Get
        let stored = get_mapping(&conn, id).unwrap().unwrap();
        assert_eq!(stored.session_id, "s1");
        assert_eq!(stored.agent_name, "agent-a");
        assert_eq!(stored.status, MappingStatus::Active);
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.updated_at, created);
        assert_eq!(stored.metadata, mapping.metadata);

        // Update status
        let later = created + Duration::seconds(5);
        let changed = update_active_status(&conn, "s1", MappingStatus::Completed, &later).unwrap();
        assert_eq!(changed, 1);

        let updated = get_mapping(&conn, id).unwrap().unwrap();
        assert_eq!(updated.status, MappingStatus::Completed);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, created);

        // Terminal rows are no longer touched
        let changed = update_active_status(&conn, "s1", MappingStatus::Failed, &later).unwrap();
        assert_eq!(changed, 0);
        assert!(find_active_by_session(&conn, "s1").unwrap().is_none());
    }

    #[test]
    fn test_lookups_prefer_newest_created_at() {
        let conn = setup_db();
        let base = now();

        // Inserted out of creation order: recency is by created_at, not id
        insert_mapping(&conn, &new_mapping("s1", "agent-new", base)).unwrap();
        insert_mapping(&conn, &new_mapping("s1", "agent-old", base - Duration::hours(1))).unwrap();

        let found = find_active_by_session(&conn, "s1").unwrap().unwrap();
        assert_eq!(found.agent_name, "agent-new");

        let five_minutes_ago = base - Duration::minutes(5);
        insert_mapping(&conn, &new_mapping("s-old", "agent-x", five_minutes_ago)).unwrap();
        insert_mapping(&conn, &new_mapping("s-new", "agent-x", base)).unwrap();

        let found = find_active_by_agent(&conn, "agent-x").unwrap().unwrap();
        assert_eq!(found.session_id, "s-new");
    }

    #[test]
    fn test_list_active_newest_first() {
        let conn = setup_db();
        let base = now();

        insert_mapping(&conn, &new_mapping("s1", "a1", base - Duration::minutes(2))).unwrap();
        insert_mapping(&conn, &new_mapping("s2", "a2", base)).unwrap();
        insert_mapping(&conn, &new_mapping("s3", "a3", base - Duration::minutes(1))).unwrap();
        update_active_status(&conn, "s3", MappingStatus::Failed, &base).unwrap();

        let sessions: Vec<String> = list_active_mappings(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.session_id)
            .collect();
        assert_eq!(sessions, vec!["s2".to_string(), "s1".to_string()]);
    }

    #[test]
    fn test_mark_stale_before_cutoff() {
        let conn = setup_db();
        let base = now();

        insert_mapping(&conn, &new_mapping("old", "a1", base - Duration::hours(30))).unwrap();
        insert_mapping(&conn, &new_mapping("fresh", "a2", base - Duration::hours(1))).unwrap();

        let cutoff = base - Duration::hours(24);
        assert_eq!(mark_stale_before(&conn, &cutoff, &base).unwrap(), 1);
        assert_eq!(mark_stale_before(&conn, &cutoff, &base).unwrap(), 0);

        let counts = count_by_status(&conn).unwrap();
        assert_eq!(
            counts,
            vec![(MappingStatus::Active, 1), (MappingStatus::Stale, 1)]
        );
    }

    #[test]
    fn test_unreadable_metadata_is_empty() {
        let conn = setup_db();
        let id = insert_mapping(&conn, &new_mapping("s1", "a1", now())).unwrap();
        conn.execute(
            "UPDATE session_mappings SET metadata = 'not json' WHERE id = ?",
            params![id],
        )
        .unwrap();

        let stored = get_mapping(&conn, id).unwrap().unwrap();
        assert!(stored.metadata.is_empty());
    }

    #[test]
    fn test_epoch_seconds_keep_microseconds() {
        let ts = Utc.timestamp_opt(1_760_000_000, 123_456_000).unwrap();
        let secs = to_epoch_secs(&ts);
        assert_eq!(from_epoch_secs(secs), Some(ts));
        assert_eq!(from_epoch_secs(f64::NAN), None);
    }
}
