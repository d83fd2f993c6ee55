//! Natural-language query translation -- entirely outside the detection
//! core. A translator turns free-form text into a structured filter that
//! consumers apply to raw events or to finding/incident tables themselves.

pub mod fallback;
pub mod remote;

use crate::ingest::{AuthEvent, EventKind, Outcome};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Structured filter produced by a translator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentFilter {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event: Option<EventKind>,
    pub status: Option<Outcome>,
}

/// Turns a free-form query into an [`IntentFilter`]. Implementations must
/// always produce a filter -- translation failures degrade, they don't
/// propagate.
#[async_trait::async_trait]
pub trait IntentTranslator: Send + Sync {
    async fn translate(&self, query: &str) -> IntentFilter;
}

/// Pick a translator by availability: the remote service when an endpoint
/// is configured, the keyword fallback otherwise.
pub fn select_translator(
    endpoint: Option<String>,
    token: Option<String>,
) -> Box<dyn IntentTranslator> {
    match endpoint {
        Some(endpoint) if !endpoint.is_empty() => {
            Box::new(remote::RemoteTranslator::new(endpoint, token))
        }
        _ => Box::new(fallback::KeywordTranslator),
    }
}

/// Apply a filter to raw events: inclusive time range plus the optional
/// event/status predicates.
pub fn apply_filter(events: &[AuthEvent], filter: &IntentFilter) -> Vec<AuthEvent> {
    events
        .iter()
        .filter(|e| e.timestamp >= filter.start && e.timestamp <= filter.end)
        .filter(|e| filter.event.map_or(true, |kind| e.event == kind))
        .filter(|e| filter.status.map_or(true, |status| e.status == status))
        .cloned()
        .collect()
}
