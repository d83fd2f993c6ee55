//! Rule-based intent translation, used when no remote service is reachable.

use super::{IntentFilter, IntentTranslator};
use crate::ingest::{EventKind, Outcome};
use chrono::{DateTime, Duration, Utc};

/// Keyword matcher over a small set of time phrases and event intents.
pub struct KeywordTranslator;

/// Map time phrases in the query onto a [start, end] window ending now.
/// Unrecognized phrasing defaults to the last hour.
pub fn parse_time_window(text: &str, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let q = text.to_lowercase();
    if q.contains("last 5 minutes") || q.contains("past 5 minutes") {
        return (now - Duration::minutes(5), now);
    }
    if q.contains("last hour") || q.contains("past hour") {
        return (now - Duration::hours(1), now);
    }
    if q.contains("today") || q.contains("last day") || q.contains("past day") || q.contains("last 24") {
        return (now - Duration::days(1), now);
    }
    (now - Duration::hours(1), now)
}

/// Pure translation against an explicit clock, so tests stay deterministic.
pub fn translate_at(query: &str, now: DateTime<Utc>) -> IntentFilter {
    let (start, end) = parse_time_window(query, now);
    let q = query.to_lowercase();

    let mut event = None;
    let mut status = None;
    let about_logins = q.contains("login") || q.contains("log in") || q.contains("sign in");
    if about_logins && (q.contains("fail") || q.contains("unsuccessful") || q.contains("invalid")) {
        event = Some(EventKind::Auth);
        status = Some(Outcome::Fail);
    }
    // "attacks" / "suspicious" queries want everything in the window

    IntentFilter {
        start,
        end,
        event,
        status,
    }
}

#[async_trait::async_trait]
impl IntentTranslator for KeywordTranslator {
    async fn translate(&self, query: &str) -> IntentFilter {
        translate_at(query, Utc::now())
    }
}
