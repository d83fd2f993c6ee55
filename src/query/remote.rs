//! Remote intent translation over HTTP, with silent degradation to the
//! keyword fallback on any transport or contract failure.

use super::fallback;
use super::{IntentFilter, IntentTranslator};
use crate::ingest::{EventKind, Outcome};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

pub struct RemoteTranslator {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RemoteTranslator {
    pub fn new(endpoint: String, token: Option<String>) -> Self {
        Self {
            endpoint,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Call the service. The response contract is a JSON object with
    /// `start`/`end` (ISO 8601 UTC) and nullable `event`/`status` strings;
    /// anything outside the whitelist is treated as null.
    async fn try_remote(&self, query: &str, now: DateTime<Utc>) -> Option<IntentFilter> {
        let mut request = self.client.post(&self.endpoint).json(&serde_json::json!({
            "query": query,
            "now": now.to_rfc3339(),
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.ok()?.error_for_status().ok()?;
        let body: Value = response.json().await.ok()?;

        let (default_start, default_end) = fallback::parse_time_window(query, now);
        let coerce = |key: &str, default: DateTime<Utc>| {
            body.get(key)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(default)
        };

        let event = match body.get("event").and_then(Value::as_str) {
            Some("auth") => Some(EventKind::Auth),
            _ => None,
        };
        let status = match body.get("status").and_then(Value::as_str) {
            Some("fail") => Some(Outcome::Fail),
            Some("success") => Some(Outcome::Success),
            _ => None,
        };

        Some(IntentFilter {
            start: coerce("start", default_start),
            end: coerce("end", default_end),
            event,
            status,
        })
    }
}

#[async_trait::async_trait]
impl IntentTranslator for RemoteTranslator {
    async fn translate(&self, query: &str) -> IntentFilter {
        let now = Utc::now();
        match self.try_remote(query, now).await {
            Some(filter) => filter,
            None => {
                warn!(endpoint = %self.endpoint, "intent service unavailable, using keyword fallback");
                fallback::translate_at(query, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        // nothing listens here; translation must still produce a filter
        let translator =
            RemoteTranslator::new("http://127.0.0.1:1/intent".to_string(), None);
        let filter = translator.translate("failed logins in the last hour").await;
        assert_eq!(filter.event, Some(EventKind::Auth));
        assert_eq!(filter.status, Some(Outcome::Fail));
    }
}
