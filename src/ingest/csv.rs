//! CSV log loader.

use super::{
    check_columns, parse_timestamp, AuthEvent, EventKind, FirewallEvent, IngestError, LogKind,
    Outcome,
};
use std::fs::File;
use std::path::Path;

/// Load authentication events from a CSV file with a header row.
pub fn load_auth_events(path: &Path) -> Result<Vec<AuthEvent>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut rdr = ::csv::Reader::from_reader(file);

    let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    check_columns(&headers, LogKind::Ssh)?;

    let idx = |name: &str| headers.iter().position(|h| h == name);
    // check_columns guarantees these exist
    let (c_ts, c_ip, c_user, c_event, c_status, c_port) = (
        idx("timestamp").unwrap_or(0),
        idx("src_ip").unwrap_or(0),
        idx("user").unwrap_or(0),
        idx("event").unwrap_or(0),
        idx("status").unwrap_or(0),
        idx("port").unwrap_or(0),
    );

    let mut events = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        events.push(AuthEvent {
            timestamp: parse_timestamp(&field(c_ts), row + 2)?,
            src_ip: field(c_ip),
            user: field(c_user),
            event: EventKind::parse(&field(c_event)),
            status: Outcome::parse(&field(c_status)),
            port: field(c_port),
        });
    }
    Ok(events)
}

/// Load firewall events from a CSV file with a header row.
pub fn load_firewall_events(path: &Path) -> Result<Vec<FirewallEvent>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut rdr = ::csv::Reader::from_reader(file);

    let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();
    check_columns(&headers, LogKind::Firewall)?;

    let idx = |name: &str| headers.iter().position(|h| h == name);
    let (c_ts, c_ip, c_dst, c_port, c_action) = (
        idx("timestamp").unwrap_or(0),
        idx("src_ip").unwrap_or(0),
        idx("dst_ip").unwrap_or(0),
        idx("port").unwrap_or(0),
        idx("action").unwrap_or(0),
    );

    let mut events = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();

        events.push(FirewallEvent {
            timestamp: parse_timestamp(&field(c_ts), row + 2)?,
            src_ip: field(c_ip),
            dst_ip: field(c_dst),
            port: field(c_port),
            action: field(c_action),
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_auth_csv() {
        let f = write_temp(
            "timestamp,src_ip,user,event,status,port\n\
             2025-09-20T10:00:00Z,10.0.0.1,root,auth,fail,22\n\
             2025-09-20T10:00:30Z,10.0.0.1,root,auth,success,22\n",
        );
        let events = load_auth_events(f.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].src_ip, "10.0.0.1");
        assert_eq!(events[0].status, Outcome::Fail);
        assert_eq!(events[1].status, Outcome::Success);
        assert_eq!(events[0].event, EventKind::Auth);
    }

    #[test]
    fn test_missing_column_fails_fast() {
        let f = write_temp("timestamp,src_ip,user,event,status\n2025-09-20T10:00:00Z,a,b,auth,fail\n");
        let err = load_auth_events(f.path()).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_bad_timestamp_reports_row() {
        let f = write_temp(
            "timestamp,src_ip,user,event,status,port\n\
             garbage,10.0.0.1,root,auth,fail,22\n",
        );
        let err = load_auth_events(f.path()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_load_firewall_csv() {
        let f = write_temp(
            "timestamp,src_ip,dst_ip,port,action\n\
             2025-09-20T10:00:00Z,10.0.0.9,192.168.1.5,443,DENY\n",
        );
        let events = load_firewall_events(f.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "DENY");
    }
}
