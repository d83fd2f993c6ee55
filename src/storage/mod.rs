//! SQLite storage layer -- schema, queries, migrations.
//!
//! Detection itself never touches the database; persistence is for
//! consumers (ranked display, blocklist curation) after a run completes.

pub mod schema;

use crate::detect::{FirewallIncident, Incident, Severity};
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;
use uuid::Uuid;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// An incident row as persisted, either log category.
#[derive(Debug, Clone, Serialize)]
pub struct StoredIncident {
    pub id: Uuid,
    pub log_kind: String,
    pub src_ip: String,
    pub last_seen: DateTime<Utc>,
    pub max_model_score: f64,
    pub rule_hits: u64,
    pub total_minutes: u64,
    pub risk: f64,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Persist the ranked incidents of one auth-category detection run.
pub fn save_auth_incidents(pool: &Pool, incidents: &[Incident]) -> Result<()> {
    let conn = pool.get()?;
    let created_at = Utc::now().to_rfc3339();
    for inc in incidents {
        conn.execute(
            "INSERT INTO incidents (id, log_kind, src_ip, last_seen, max_model_score,
                                    rule_hits, total_minutes, risk, severity, created_at)
             VALUES (?1, 'ssh', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                inc.src_ip,
                inc.last_seen.to_rfc3339(),
                inc.max_model_score,
                inc.rule_hits as i64,
                inc.total_minutes as i64,
                inc.risk,
                inc.severity.as_str(),
                created_at,
            ],
        )?;
    }
    Ok(())
}

/// Persist the ranked incidents of one firewall-category run.
pub fn save_firewall_incidents(pool: &Pool, incidents: &[FirewallIncident]) -> Result<()> {
    let conn = pool.get()?;
    let created_at = Utc::now().to_rfc3339();
    for inc in incidents {
        conn.execute(
            "INSERT INTO incidents (id, log_kind, src_ip, last_seen, max_model_score,
                                    rule_hits, total_minutes, risk, severity, created_at)
             VALUES (?1, 'firewall', ?2, ?3, 0, ?4, 0, ?5, ?6, ?7)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                inc.src_ip,
                inc.last_seen.to_rfc3339(),
                inc.denies as i64,
                inc.risk,
                inc.severity.as_str(),
                created_at,
            ],
        )?;
    }
    Ok(())
}

fn parse_stored_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .unwrap_or_default()
}

/// List recently persisted incidents, newest first.
pub fn list_recent_incidents(pool: &Pool, limit: usize) -> Result<Vec<StoredIncident>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, log_kind, src_ip, last_seen, max_model_score, rule_hits,
                total_minutes, risk, severity, created_at
         FROM incidents ORDER BY created_at DESC, risk DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        let id_str: String = row.get(0)?;
        let sev_str: String = row.get(8)?;
        Ok(StoredIncident {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            log_kind: row.get(1)?,
            src_ip: row.get(2)?,
            last_seen: parse_stored_time(&row.get::<_, String>(3)?),
            max_model_score: row.get(4)?,
            rule_hits: row.get::<_, i64>(5)? as u64,
            total_minutes: row.get::<_, i64>(6)? as u64,
            risk: row.get(7)?,
            severity: sev_str.parse().unwrap_or(Severity::Low),
            created_at: parse_stored_time(&row.get::<_, String>(9)?),
        })
    })?;

    let mut incidents = Vec::new();
    for r in rows.flatten() {
        incidents.push(r);
    }
    Ok(incidents)
}

/// Add a source to the blocklist. Idempotent.
pub fn block_ip(pool: &Pool, src_ip: &str) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT OR IGNORE INTO blocklist (src_ip, created_at) VALUES (?1, ?2)",
        rusqlite::params![src_ip, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Remove a source from the blocklist. Removing an absent entry is fine.
pub fn unblock_ip(pool: &Pool, src_ip: &str) -> Result<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM blocklist WHERE src_ip = ?1", [src_ip])?;
    Ok(())
}

/// All blocked sources, sorted.
pub fn list_blocklist(pool: &Pool) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT src_ip FROM blocklist ORDER BY src_ip ASC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ips = Vec::new();
    for r in rows.flatten() {
        ips.push(r);
    }
    Ok(ips)
}
