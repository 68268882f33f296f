use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;

/// Fixed-width snapshot timestamp, `YYYYMMDD-HHMMSS`
///
/// Ordering the strings orders the instants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub const FORMAT: &'static str = "%Y%m%d-%H%M%S";
    pub const LEN: usize = 15;
    pub const DATE_LEN: usize = 8;

    /// Parse a directory name, rejecting anything that is not a timestamp.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != Self::LEN {
            return None;
        }
        NaiveDateTime::parse_from_str(s, Self::FORMAT)
            .ok()
            .map(|_| Timestamp(s.to_string()))
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Timestamp(dt.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDD` part.
    pub fn date(&self) -> &str {
        &self.0[..Self::DATE_LEN]
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, Self::FORMAT).ok()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues strictly increasing timestamps from the local clock.
///
/// Two snapshots requested within the same second get consecutive seconds
/// instead of the same directory name.
#[derive(Debug, Default)]
pub struct TimestampClock {
    last: std::sync::Mutex<Option<NaiveDateTime>>,
}

impl TimestampClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Timestamp {
        let now = chrono::Local::now().naive_local();
        let now = now.with_nanosecond(0).unwrap_or(now);
        self.next_after(now)
    }

    fn next_after(&self, now: NaiveDateTime) -> Timestamp {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let issued = match *last {
            Some(prev) if now <= prev => prev + chrono::Duration::seconds(1),
            _ => now,
        };
        *last = Some(issued);
        Timestamp::from_datetime(issued)
    }
}
