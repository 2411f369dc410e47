//! Decoders for the two feed sources: the `"user","message","type","millis"`
//! payload of a live event, and the JSON document of the bulk endpoint.
//!
//! Neither decoder panics. A bad live payload yields a [`DecodeError`]; a bad
//! bulk record is skipped.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::entry::{epoch_millis_to_iso, server_time_to_iso, Category, EntryId, FeedEntry};

static PAYLOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^"([^"]+)"\s*,\s*"([^"]+)"\s*,\s*"([^"]+)"\s*,\s*"([^"]+)"$"#)
        .expect("live payload pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed live payload: {0:?}")]
    Malformed(String),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// A decoded live event, before it becomes a [`FeedEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub actor: String,
    pub message: String,
    pub event_type: String,
    pub epoch_millis: i64,
}

impl LiveEvent {
    /// Strictly decode one message payload. Surrounding whitespace is
    /// ignored; every field must be a non-empty double-quoted string and the
    /// last one an integer count of epoch milliseconds.
    pub fn decode(data: &str) -> Result<Self, DecodeError> {
        let raw = data.trim();
        let caps = PAYLOAD_RE
            .captures(raw)
            .ok_or_else(|| DecodeError::Malformed(raw.to_string()))?;

        let millis_raw = &caps[4];
        let epoch_millis: i64 = millis_raw
            .parse()
            .map_err(|_| DecodeError::InvalidTimestamp(millis_raw.to_string()))?;

        Ok(Self {
            actor: caps[1].to_string(),
            message: caps[2].to_string(),
            event_type: caps[3].to_string(),
            epoch_millis,
        })
    }

    pub fn into_entry(self) -> Result<FeedEntry, DecodeError> {
        let occurred_at = epoch_millis_to_iso(self.epoch_millis)
            .ok_or(DecodeError::TimestampOutOfRange(self.epoch_millis))?;
        Ok(FeedEntry {
            id: EntryId::Epoch(self.epoch_millis),
            category: Category::normalize(&self.event_type),
            actor: self.actor,
            message: self.message,
            occurred_at,
        })
    }
}

/// Decode a live payload straight into a feed entry.
pub fn decode_live_entry(data: &str) -> Result<FeedEntry, DecodeError> {
    LiveEvent::decode(data)?.into_entry()
}

/// One record of `GET /updates/latest`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateRecord {
    pub time: String,
    pub github_username: String,
    pub message: String,
    pub event_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdatesPayload {
    pub updates: Vec<UpdateRecord>,
}

impl UpdatesPayload {
    /// The first `limit` records as feed entries, in server order. Records
    /// whose time does not parse are logged and skipped.
    #[must_use]
    pub fn into_entries(self, limit: usize) -> Vec<FeedEntry> {
        self.updates
            .into_iter()
            .take(limit)
            .filter_map(|record| {
                let Some(occurred_at) = server_time_to_iso(&record.time) else {
                    tracing::warn!(time = %record.time, actor = %record.github_username, "Skipping update with unparseable time");
                    return None;
                };
                Some(FeedEntry {
                    category: Category::normalize(&record.event_type),
                    id: EntryId::Timestamp(record.time),
                    actor: record.github_username,
                    message: record.message,
                    occurred_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_the_documented_example() {
        let entry = decode_live_entry(r#""alice","fixed bug","issue-report","1700000000000""#)
            .unwrap();
        assert_eq!(entry.actor, "alice");
        assert_eq!(entry.message, "fixed bug");
        assert_eq!(entry.category, Category::Issue);
        assert_eq!(entry.occurred_at, "2023-11-14T22:13:20.000Z");
        assert_eq!(entry.id, EntryId::Epoch(1_700_000_000_000));
    }

    #[test]
    fn tolerates_whitespace_between_fields() {
        let event = LiveEvent::decode("  \"bob\" ,  \"won bounty\",\"Bounty\" , \"5\"\n").unwrap();
        assert_eq!(event.actor, "bob");
        assert_eq!(event.event_type, "Bounty");
        assert_eq!(event.epoch_millis, 5);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            "",
            "alice,fixed bug,issue,1700000000000",
            r#""alice","fixed bug","issue""#,
            r#""alice","fixed bug","issue","1700000000000","extra""#,
            r#""","fixed bug","issue","1700000000000""#,
            r#"{"actor": "alice"}"#,
        ] {
            assert!(
                matches!(LiveEvent::decode(payload), Err(DecodeError::Malformed(_))),
                "{payload:?}"
            );
        }
    }

    #[test]
    fn rejects_non_integer_timestamps() {
        for millis in ["soon", "17e11", "1.5", " 12"] {
            let payload = format!(r#""alice","msg","issue","{millis}""#);
            assert!(
                matches!(
                    LiveEvent::decode(&payload),
                    Err(DecodeError::InvalidTimestamp(_))
                ),
                "{millis:?}"
            );
        }
        let huge = r#""alice","msg","issue","9223372036854775807""#;
        assert!(matches!(
            decode_live_entry(huge),
            Err(DecodeError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn bulk_records_keep_order_and_limit() {
        let payload: UpdatesPayload = serde_json::from_value(json!({
            "updates": [
                {"time": "2024-03-01T12:00:05Z", "github_username": "a", "message": "m1", "event_type": "Top-3"},
                {"time": "not a time", "github_username": "b", "message": "m2", "event_type": "bounty"},
                {"time": "2024-03-01T12:00:03Z", "github_username": "c", "message": "m3", "event_type": "issue"},
                {"time": "2024-03-01T12:00:02Z", "github_username": "d", "message": "m4", "event_type": "pr"}
            ]
        }))
        .unwrap();

        let entries = payload.into_entries(3);
        let actors: Vec<_> = entries.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, ["a", "c"]);
        assert_eq!(entries[0].category, Category::TopRank);
        assert_eq!(entries[0].id, EntryId::Timestamp("2024-03-01T12:00:05Z".into()));
        assert_eq!(entries[0].occurred_at, "2024-03-01T12:00:05.000Z");
    }
}
