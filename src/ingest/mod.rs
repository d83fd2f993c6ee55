//! Log ingestion -- typed event records and file loaders.

pub mod csv;
pub mod json;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column '{column}' for {log_kind} logs")]
    MissingColumn {
        column: &'static str,
        log_kind: LogKind,
    },

    #[error("row {row}: unparseable timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log category, selects which column set the loader expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Ssh,
    Firewall,
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Ssh => write!(f, "ssh"),
            LogKind::Firewall => write!(f, "firewall"),
        }
    }
}

impl std::str::FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(LogKind::Ssh),
            "firewall" => Ok(LogKind::Firewall),
            other => Err(format!("unknown log kind '{other}' (expected ssh or firewall)")),
        }
    }
}

/// What a log line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Auth,
    Other,
}

impl EventKind {
    pub(crate) fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("auth") {
            EventKind::Auth
        } else {
            EventKind::Other
        }
    }
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Fail,
    None,
}

impl Outcome {
    pub(crate) fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "success" => Outcome::Success,
            "fail" => Outcome::Fail,
            _ => Outcome::None,
        }
    }
}

/// One authentication log event. Read-only input to the detection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    pub timestamp: DateTime<Utc>,
    pub src_ip: String,
    pub user: String,
    pub event: EventKind,
    pub status: Outcome,
    pub port: String,
}

/// One firewall log event (deny-action category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallEvent {
    pub timestamp: DateTime<Utc>,
    pub src_ip: String,
    pub dst_ip: String,
    pub port: String,
    pub action: String,
}

/// Parse a timestamp as a UTC instant. Accepts RFC 3339 and the bare
/// `YYYY-MM-DD HH:MM:SS` form common in exported logs.
pub fn parse_timestamp(value: &str, row: usize) -> Result<DateTime<Utc>, IngestError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(IngestError::BadTimestamp {
        row,
        value: value.to_string(),
    })
}

pub const SSH_COLUMNS: &[&str] = &["timestamp", "src_ip", "user", "event", "status", "port"];
pub const FIREWALL_COLUMNS: &[&str] = &["timestamp", "src_ip", "dst_ip", "port", "action"];

/// Verify all required columns are present, failing fast on the first gap.
pub fn check_columns(
    present: &[String],
    kind: LogKind,
) -> Result<(), IngestError> {
    let required: &[&str] = match kind {
        LogKind::Ssh => SSH_COLUMNS,
        LogKind::Firewall => FIREWALL_COLUMNS,
    };
    for col in required {
        if !present.iter().any(|h| h == col) {
            return Err(IngestError::MissingColumn {
                column: col,
                log_kind: kind,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2025-09-20T13:05:00Z", 0).is_ok());
        assert!(parse_timestamp("2025-09-20T13:05:00+02:00", 0).is_ok());
        assert!(parse_timestamp("2025-09-20 13:05:00", 0).is_ok());
        assert!(parse_timestamp("not-a-time", 3).is_err());
    }

    #[test]
    fn test_column_check_reports_first_missing() {
        let headers = vec!["timestamp".to_string(), "src_ip".to_string()];
        let err = check_columns(&headers, LogKind::Ssh).unwrap_err();
        match err {
            IngestError::MissingColumn { column, .. } => assert_eq!(column, "user"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_outcome_parse_is_lenient() {
        assert_eq!(Outcome::parse("FAIL"), Outcome::Fail);
        assert_eq!(Outcome::parse("success"), Outcome::Success);
        assert_eq!(Outcome::parse(""), Outcome::None);
        assert_eq!(Outcome::parse("timeout"), Outcome::None);
    }
}
