//! Event and ledger data model.
//!
//! All `modified_at` values in the system are produced by
//! [`parse_timestamp`] -- the single canonical parser. Version comparison
//! between the feed and the ledger is only meaningful because both sides
//! go through the same rule.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// ICS property names the event model consumes.
const PROP_UID: &str = "UID";
const PROP_SUMMARY: &str = "SUMMARY";
const PROP_DTSTART: &str = "DTSTART";
const PROP_LAST_MODIFIED: &str = "LAST-MODIFIED";
const PROP_DESCRIPTION: &str = "DESCRIPTION";

/// Parse a feed timestamp into UTC.
///
/// Accepted formats, tried in order:
/// - RFC 3339 (`2024-03-01T09:30:00+02:00`)
/// - ICS basic UTC (`20240301T093000Z`)
/// - ICS basic local (`20240301T093000`, assumed UTC)
/// - ISO without offset (`2024-03-01T09:30:00`, assumed UTC)
/// - bare date (`20240301`, midnight UTC)
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, FeedError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y%m%dT%H%M%SZ", "%Y%m%dT%H%M%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    Err(FeedError::InvalidTimestamp {
        value: value.to_string(),
        message: "not RFC 3339, ICS basic, or YYYYMMDD".to_string(),
    })
}

/// One calendar entry as currently reported by the source feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Stable external identifier, unique within a snapshot.
    pub id: String,
    pub title: String,
    /// Start of the event (the feed's `DTSTART`).
    pub start: DateTime<Utc>,
    /// Version marker, monotonic per id across feed updates.
    pub modified_at: DateTime<Utc>,
    /// Free-text body; empty when the feed carries none.
    pub description: String,
}

impl SourceEvent {
    /// Build an event from the raw ICS property map of one VEVENT block.
    ///
    /// `UID`, `SUMMARY`, `DTSTART` and `LAST-MODIFIED` are required;
    /// `DESCRIPTION` defaults to the empty string.
    pub fn from_ics_props(props: &HashMap<String, String>) -> Result<Self, FeedError> {
        let uid = props.get(PROP_UID).map(|s| s.to_string());

        let id = required(props, &uid, PROP_UID)?.to_string();
        let title = required(props, &uid, PROP_SUMMARY)?.to_string();
        let start = parse_timestamp(required(props, &uid, PROP_DTSTART)?)?;
        let modified_at = parse_timestamp(required(props, &uid, PROP_LAST_MODIFIED)?)?;
        let description = props
            .get(PROP_DESCRIPTION)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            id,
            title,
            start,
            modified_at,
            description,
        })
    }
}

/// Look up a required, non-empty property.
fn required<'a>(
    props: &'a HashMap<String, String>,
    uid: &Option<String>,
    field: &'static str,
) -> Result<&'a str, FeedError> {
    props
        .get(field)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(FeedError::MalformedEvent {
            uid: uid.clone(),
            field,
        })
}

impl std::fmt::Display for SourceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.title, self.id)
    }
}

/// The last-synchronized state for one source id.
///
/// A record exists iff the corresponding entity currently exists in the
/// target store; deletion removes the record rather than soft-deleting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Matches [`SourceEvent::id`].
    pub source_id: String,
    /// Opaque identifier assigned by the target store on create.
    pub target_ref: String,
    /// The event's `modified_at` at the time of last successful sync.
    pub modified_at: DateTime<Utc>,
}

/// The full set of source events returned by one fetch. Transient, never
/// persisted. Keyed by id so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    events: BTreeMap<String, SourceEvent>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect events into a snapshot. A duplicate id keeps the first
    /// occurrence; feeds are not supposed to repeat UIDs.
    pub fn from_events(events: impl IntoIterator<Item = SourceEvent>) -> Self {
        let mut snapshot = Self::new();
        for event in events {
            snapshot.insert(event);
        }
        snapshot
    }

    /// Insert an event, keeping the existing one on id collision.
    /// Returns whether the event was inserted.
    pub fn insert(&mut self, event: SourceEvent) -> bool {
        if self.events.contains_key(&event.id) {
            tracing::warn!(id = %event.id, "duplicate event id in snapshot, keeping first");
            return false;
        }
        self.events.insert(event.id.clone(), event);
        true
    }

    pub fn get(&self, id: &str) -> Option<&SourceEvent> {
        self.events.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    /// Events in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceEvent> {
        self.events.values()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2024-03-01T09:30:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap());
    }

    #[test]
    fn parse_timestamp_ics_basic_utc() {
        let ts = parse_timestamp("20240301T093000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn parse_timestamp_ics_basic_local_assumed_utc() {
        let ts = parse_timestamp("20240301T093000").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn parse_timestamp_bare_date() {
        let ts = parse_timestamp("20240301").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(FeedError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn event_from_full_props() {
        let event = SourceEvent::from_ics_props(&props(&[
            ("UID", "ev-1"),
            ("SUMMARY", "Linear algebra HW"),
            ("DTSTART", "20240310"),
            ("LAST-MODIFIED", "20240301T120000Z"),
            ("DESCRIPTION", "Chapters 3-4"),
        ]))
        .unwrap();

        assert_eq!(event.id, "ev-1");
        assert_eq!(event.title, "Linear algebra HW");
        assert_eq!(event.description, "Chapters 3-4");
        assert_eq!(
            event.modified_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn event_description_defaults_to_empty() {
        let event = SourceEvent::from_ics_props(&props(&[
            ("UID", "ev-1"),
            ("SUMMARY", "Quiz"),
            ("DTSTART", "20240310"),
            ("LAST-MODIFIED", "20240301T120000Z"),
        ]))
        .unwrap();
        assert_eq!(event.description, "");
    }

    #[test]
    fn event_missing_required_field_is_malformed() {
        let err = SourceEvent::from_ics_props(&props(&[
            ("UID", "ev-1"),
            ("DTSTART", "20240310"),
            ("LAST-MODIFIED", "20240301T120000Z"),
        ]))
        .unwrap_err();

        match err {
            FeedError::MalformedEvent { uid, field } => {
                assert_eq!(uid.as_deref(), Some("ev-1"));
                assert_eq!(field, "SUMMARY");
            }
            other => panic!("expected MalformedEvent, got {other}"),
        }
    }

    #[test]
    fn event_missing_uid_reported_without_uid() {
        let err = SourceEvent::from_ics_props(&props(&[
            ("SUMMARY", "Quiz"),
            ("DTSTART", "20240310"),
            ("LAST-MODIFIED", "20240301T120000Z"),
        ]))
        .unwrap_err();

        match err {
            FeedError::MalformedEvent { uid, field } => {
                assert!(uid.is_none());
                assert_eq!(field, "UID");
            }
            other => panic!("expected MalformedEvent, got {other}"),
        }
    }

    #[test]
    fn snapshot_keeps_first_on_duplicate_id() {
        let make = |title: &str| SourceEvent {
            id: "dup".to_string(),
            title: title.to_string(),
            start: Utc::now(),
            modified_at: Utc::now(),
            description: String::new(),
        };

        let snapshot = Snapshot::from_events([make("first"), make("second")]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("dup").unwrap().title, "first");
    }

    #[test]
    fn snapshot_iterates_in_id_order() {
        let make = |id: &str| SourceEvent {
            id: id.to_string(),
            title: id.to_string(),
            start: Utc::now(),
            modified_at: Utc::now(),
            description: String::new(),
        };

        let snapshot = Snapshot::from_events([make("b"), make("a"), make("c")]);
        let ids: Vec<_> = snapshot.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
