use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Latest year whose RFC 3339 form can be read back.
pub const MAX_DUE_YEAR: i32 = 9999;

/// A due timestamp, always held in UTC.
///
/// The persisted form is RFC 3339 with an explicit `+00:00` offset
/// (`2026-02-22T01:00:00+00:00`). The empty string is the canonical
/// "no due date" sentinel and is preserved as-is, never written as null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueAt(Option<DateTime<Utc>>);

impl DueAt {
    /// No due date.
    pub const NONE: DueAt = DueAt(None);

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(Some(instant))
    }

    /// Convert a zoned value to the UTC form.
    pub fn from_zoned<T: TimeZone>(value: &DateTime<T>) -> Self {
        Self(Some(value.with_timezone(&Utc)))
    }

    /// Interpret a wall-clock value in `tz`. Ambiguous local times (DST
    /// fold) take the earlier instant; non-existent ones yield no due.
    pub fn from_local(naive: NaiveDateTime, tz: Tz) -> Self {
        Self(
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        )
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Whether `instant` has a four-digit year, the only form RFC 3339
    /// storage round-trips.
    pub fn is_storable_instant(instant: &DateTime<Utc>) -> bool {
        (1..=MAX_DUE_YEAR).contains(&instant.year())
    }

    /// The empty sentinel or an instant within the storable year range.
    pub fn is_storable(&self) -> bool {
        self.0.as_ref().map_or(true, Self::is_storable_instant)
    }

    pub fn utc(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// The due instant expressed in `tz`.
    pub fn local(&self, tz: Tz) -> Option<DateTime<Tz>> {
        self.0.map(|dt| dt.with_timezone(&tz))
    }

    /// Persisted representation: `""` or RFC 3339 UTC with `+00:00`.
    pub fn to_storage(&self) -> String {
        match self.0 {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, false),
            None => String::new(),
        }
    }

    /// Parse a persisted value. Accepts the empty sentinel and any RFC 3339
    /// offset (normalized to UTC). Anything else is rejected.
    pub fn from_storage(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::NONE);
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| Self(Some(dt.with_timezone(&Utc))))
            .map_err(|e| format!("Invalid due timestamp '{}': {}", raw, e))
    }
}

impl From<DateTime<Utc>> for DueAt {
    fn from(value: DateTime<Utc>) -> Self {
        Self(Some(value))
    }
}

impl From<Option<DateTime<Utc>>> for DueAt {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        Self(value)
    }
}

impl fmt::Display for DueAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage())
    }
}

impl Serialize for DueAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_storage())
    }
}

impl<'de> Deserialize<'de> for DueAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DueAt::from_storage(&raw).map_err(serde::de::Error::custom)
    }
}
