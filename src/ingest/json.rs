//! JSON log loader -- an array of event objects with the same column
//! contract as the CSV form.

use super::{
    check_columns, parse_timestamp, AuthEvent, EventKind, FirewallEvent, IngestError, LogKind,
    Outcome,
};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn read_array(path: &Path) -> Result<Vec<Value>, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let value: Value = serde_json::from_reader(BufReader::new(file))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn str_field(obj: &Value, key: &str) -> String {
    obj.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn keys_of_first(items: &[Value]) -> Vec<String> {
    items
        .first()
        .and_then(Value::as_object)
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

/// Load authentication events from a JSON array file.
pub fn load_auth_events(path: &Path) -> Result<Vec<AuthEvent>, IngestError> {
    let items = read_array(path)?;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    check_columns(&keys_of_first(&items), LogKind::Ssh)?;

    let mut events = Vec::with_capacity(items.len());
    for (row, obj) in items.iter().enumerate() {
        events.push(AuthEvent {
            timestamp: parse_timestamp(&str_field(obj, "timestamp"), row + 1)?,
            src_ip: str_field(obj, "src_ip"),
            user: str_field(obj, "user"),
            event: EventKind::parse(&str_field(obj, "event")),
            status: Outcome::parse(&str_field(obj, "status")),
            port: str_field(obj, "port"),
        });
    }
    Ok(events)
}

/// Load firewall events from a JSON array file.
pub fn load_firewall_events(path: &Path) -> Result<Vec<FirewallEvent>, IngestError> {
    let items = read_array(path)?;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    check_columns(&keys_of_first(&items), LogKind::Firewall)?;

    let mut events = Vec::with_capacity(items.len());
    for (row, obj) in items.iter().enumerate() {
        events.push(FirewallEvent {
            timestamp: parse_timestamp(&str_field(obj, "timestamp"), row + 1)?,
            src_ip: str_field(obj, "src_ip"),
            dst_ip: str_field(obj, "dst_ip"),
            port: str_field(obj, "port"),
            action: str_field(obj, "action"),
        });
    }
    Ok(events)
}
