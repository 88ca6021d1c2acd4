use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

///
/// Timestamp
///
/// Whole seconds since the Unix epoch (UTC).
///

#[derive(
    CandidType,
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    #[must_use]
    pub const fn from_seconds(secs: i64) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.0
    }

    /// Parse RFC 3339 text, or a bare integer count of seconds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<i64>() {
            return Some(Self(secs));
        }

        OffsetDateTime::parse(s, &Rfc3339)
            .ok()
            .map(|dt| Self(dt.unix_timestamp()))
    }

    fn to_rfc3339(self) -> Option<String> {
        OffsetDateTime::from_unix_timestamp(self.0)
            .ok()?
            .format(&Rfc3339)
            .ok()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, "{}", self.0),
        }
    }
}
