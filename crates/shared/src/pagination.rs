//! Keyset-pagination cursors for event-log batching.
//!
//! The export runner pages through the event log in occurrence order. A
//! cursor pins the resume position to `(occurred_at, id)` so that events
//! sharing a timestamp are never skipped or duplicated between batches.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Error type for cursor operations.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Resume position within an event-log scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCursor {
    pub occurred_at: DateTime<Utc>,
    pub id: Uuid,
}

impl EventCursor {
    pub fn new(occurred_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { occurred_at, id }
    }

    /// Encodes the cursor as base64(RFC3339_timestamp:uuid).
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.occurred_at
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decodes a cursor produced by [`EventCursor::encode`].
    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| CursorError::InvalidEncoding)?;

        let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

        // Split on last colon (timestamp contains colons)
        let colon_pos = s.rfind(':').ok_or(CursorError::InvalidFormat)?;

        let timestamp_str = &s[..colon_pos];
        let id_str = &s[colon_pos + 1..];

        let id: Uuid = id_str.parse().map_err(|_| CursorError::InvalidId)?;

        let occurred_at = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .with_timezone(&Utc);

        Ok(Self { occurred_at, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_decode_cursor_roundtrip() {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let id = Uuid::new_v4();

        let cursor = EventCursor::new(timestamp, id);
        let decoded = EventCursor::decode(&cursor.encode()).unwrap();

        assert_eq!(decoded.occurred_at, timestamp);
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn test_encode_decode_with_microseconds() {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 6, 1, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(123_456))
            .unwrap();
        let cursor = EventCursor::new(timestamp, Uuid::new_v4());
        let decoded = EventCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.occurred_at, timestamp);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            EventCursor::decode("!!!not-base64!!!"),
            Err(CursorError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        let encoded = URL_SAFE_NO_PAD.encode(b"no-separator-here");
        assert!(matches!(
            EventCursor::decode(&encoded),
            Err(CursorError::InvalidFormat)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_uuid() {
        let encoded = URL_SAFE_NO_PAD.encode(b"2024-01-15T10:30:00.000000Z:not-a-uuid");
        assert!(matches!(
            EventCursor::decode(&encoded),
            Err(CursorError::InvalidId)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let id = Uuid::new_v4();
        let encoded = URL_SAFE_NO_PAD.encode(format!("yesterday:{}", id).as_bytes());
        assert!(matches!(
            EventCursor::decode(&encoded),
            Err(CursorError::InvalidTimestamp)
        ));
    }
}
