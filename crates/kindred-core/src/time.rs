use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, UtcOffset};

/// A UTC instant stored on documents.
///
/// Timestamps are totally ordered, which is what the retention queries rely on
/// (`createdAt < cutoff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime.to_offset(UtcOffset::UTC))
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.0.unix_timestamp()
    }

    /// The instant `age` before this one.
    pub fn minus(&self, age: Duration) -> Self {
        Self(self.0 - age)
    }

    /// How long ago this instant was, relative to `now`.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.0 - self.0
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|e| CoreError::invalid_timestamp(format!("'{s}': {e}")))?;
        Ok(Timestamp::new(datetime))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> Timestamp {
    Timestamp(OffsetDateTime::now_utc())
}
