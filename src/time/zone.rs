//! Reference time zone used to turn instants into calendar fields

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Civil time zone in which years, months and backup folder names are computed
///
/// Pinning a named zone keeps a file in the same month folder no matter
/// which machine runs the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceZone {
    /// The zone of the machine running the tool
    #[default]
    Local,
    /// A named IANA zone such as `America/Chicago`
    Named(Tz),
}

impl ReferenceZone {
    /// Parse an IANA zone name
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(ReferenceZone::Named)
            .map_err(|_| Error::InvalidTimeZone(name.to_string()))
    }

    /// Wall-clock time of `instant` in this zone
    pub fn to_civil(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            ReferenceZone::Local => instant.with_timezone(&Local).naive_local(),
            ReferenceZone::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant;
    /// times skipped by a DST jump have no instant.
    pub fn from_civil(&self, civil: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            ReferenceZone::Local => Local
                .from_local_datetime(&civil)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            ReferenceZone::Named(tz) => tz
                .from_local_datetime(&civil)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceZone::Local => write!(f, "local"),
            ReferenceZone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}
