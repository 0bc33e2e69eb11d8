use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::debug;

/// Offset between the local clock and the server's, refreshed on every
/// successful poll. Last writer wins; no smoothing.
#[derive(Debug, Default)]
pub struct ServerClock {
    offset_ms: AtomicI64,
    synced: AtomicBool,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&self, server_timestamp: &str) {
        self.sync_at(server_timestamp, Utc::now());
    }

    pub fn sync_at(&self, server_timestamp: &str, local: DateTime<Utc>) {
        let Some(server) = parse_timestamp(server_timestamp) else {
            debug!(server_timestamp, "ignoring unparseable server timestamp");
            return;
        };

        let offset = (server - local).num_milliseconds();
        self.offset_ms.store(offset, Ordering::Relaxed);
        self.synced.store(true, Ordering::Relaxed);
    }

    /// server − local, in milliseconds.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Server-authoritative current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now_at(Utc::now())
    }

    pub fn now_at(&self, local: DateTime<Utc>) -> DateTime<Utc> {
        local + TimeDelta::milliseconds(self.offset_ms())
    }
}

/// RFC 3339 first; naive ISO-8601 (no offset) is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn offset_is_server_minus_local() {
        let clock = ServerClock::new();
        assert!(!clock.is_synced());

        clock.sync_at("2026-10-19T08:00:02.500Z", at("2026-10-19T08:00:00Z"));
        assert_eq!(clock.offset_ms(), 2_500);
        assert!(clock.is_synced());

        clock.sync_at("2026-10-19T07:59:59+00:00", at("2026-10-19T08:00:00Z"));
        assert_eq!(clock.offset_ms(), -1_000);
    }

    #[test]
    fn malformed_timestamp_keeps_previous_offset() {
        let clock = ServerClock::new();
        clock.sync_at("2026-10-19T08:00:03Z", at("2026-10-19T08:00:00Z"));
        clock.sync_at("yesterday-ish", at("2026-10-19T08:00:00Z"));
        assert_eq!(clock.offset_ms(), 3_000);
    }

    #[test]
    fn naive_timestamps_read_as_utc() {
        assert_eq!(at("2026-10-19T08:00:00.123456"), at("2026-10-19T08:00:00.123456Z"));
        assert_eq!(at("2026-10-19 18:00"), at("2026-10-19T18:00:00Z"));
    }

    #[test]
    fn now_is_local_plus_offset() {
        let clock = ServerClock::new();
        let local = at("2026-10-19T08:00:00Z");
        assert_eq!(clock.now_at(local), local);

        clock.sync_at("2026-10-19T08:00:02.500Z", local);
        assert_eq!(clock.now_at(local), at("2026-10-19T08:00:02.500Z"));
        assert_eq!(
            clock.now_at(at("2026-10-19T09:00:00Z")),
            at("2026-10-19T09:00:02.500Z")
        );
    }
}
