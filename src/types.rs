//! Core types: indicator observations, tag canonicalization, timestamps

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Group assigned to observations that don't name one
pub const DEFAULT_GROUP: &str = "everyone";

/// Separator used in the canonical tag string
pub const TAG_SEPARATOR: char = ',';

/// Tags as supplied by a feed parser
///
/// Either a list/set of individual tags or a single pre-joined string.
/// Both forms reduce to the same canonical string via [`Tags::canonical`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    /// Individual tag values, in any order
    List(Vec<String>),
    /// A comma-separated string, in any order
    Joined(String),
}

impl Tags {
    /// Canonical form: split, trimmed, de-duplicated, sorted, comma-joined
    ///
    /// Tags behave as a set: a list repeating an entry, such as `["a", "a"]`,
    /// canonicalizes to `"a"` and so equals the list `["a"]`.
    pub fn canonical(&self) -> String {
        match self {
            Tags::List(items) => canonicalize_tags(items),
            Tags::Joined(joined) => canonicalize_tags(joined.split(TAG_SEPARATOR)),
        }
    }
}

impl Default for Tags {
    fn default() -> Self {
        Tags::List(Vec::new())
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Tags::List(tags)
    }
}

impl From<Vec<&str>> for Tags {
    fn from(tags: Vec<&str>) -> Self {
        Tags::List(tags.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        Tags::List(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        Tags::List(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl From<BTreeSet<String>> for Tags {
    fn from(tags: BTreeSet<String>) -> Self {
        Tags::List(tags.into_iter().collect())
    }
}

impl From<HashSet<String>> for Tags {
    fn from(tags: HashSet<String>) -> Self {
        Tags::List(tags.into_iter().collect())
    }
}

impl From<&str> for Tags {
    fn from(joined: &str) -> Self {
        Tags::Joined(joined.to_string())
    }
}

impl From<String> for Tags {
    fn from(joined: String) -> Self {
        Tags::Joined(joined)
    }
}

/// Reduce a collection of tags to its canonical comma-joined string
///
/// Whitespace around each tag is trimmed and empty tags are dropped, so
/// canonicalizing an already-canonical string splits back into the same set.
pub fn canonicalize_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    set.into_iter().collect::<Vec<_>>().join(",")
}

/// Parse an ISO-8601 timestamp into a UTC instant with whole-second precision
///
/// Accepts RFC 3339 with an offset, naive date-times (`T` or space separated,
/// optional fraction) taken as UTC, and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(truncate_to_seconds(dt.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(truncate_to_seconds(naive.and_utc()));
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(Error::InvalidTimestamp {
        value: value.to_string(),
        reason: "expected RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'".to_string(),
    })
}

/// Drop sub-second precision; the archive stores unix seconds
pub fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// One sighting of an indicator reported by a provider
///
/// Constructed with [`Observation::new`] and the `with_*` builders. Tags are
/// canonicalized and timestamps truncated to whole seconds on construction,
/// so an observation compares equal to the same observation read back from
/// the archive. Deserialization goes through the same builders, so tags may
/// be given as a list or a joined string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawObservation")]
pub struct Observation {
    indicator: String,
    provider: String,
    group: String,
    tags: String,
    firsttime: Option<DateTime<Utc>>,
    lasttime: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

impl Observation {
    /// Create an observation in the default group with no tags or time window
    pub fn new(indicator: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            indicator: indicator.into(),
            provider: provider.into(),
            group: DEFAULT_GROUP.to_string(),
            tags: String::new(),
            firsttime: None,
            lasttime: None,
            created_at: None,
        }
    }

    /// Set the visibility group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the tags; stored in canonical form
    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into().canonical();
        self
    }

    /// Set the first-seen time
    pub fn with_firsttime(mut self, firsttime: DateTime<Utc>) -> Self {
        self.firsttime = Some(truncate_to_seconds(firsttime));
        self
    }

    /// Set the last-seen time
    pub fn with_lasttime(mut self, lasttime: DateTime<Utc>) -> Self {
        self.lasttime = Some(truncate_to_seconds(lasttime));
        self
    }

    /// Set the first-seen time from an ISO-8601 string
    pub fn with_firsttime_str(self, firsttime: &str) -> Result<Self> {
        Ok(self.with_firsttime(parse_timestamp(firsttime)?))
    }

    /// Set the last-seen time from an ISO-8601 string
    pub fn with_lasttime_str(self, lasttime: &str) -> Result<Self> {
        Ok(self.with_lasttime(parse_timestamp(lasttime)?))
    }

    /// Override the persistence time (the store assigns "now" otherwise)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(truncate_to_seconds(created_at));
        self
    }

    /// The observed value (IP, domain, hash, ...)
    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    /// Feed/source identifier
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Visibility group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Canonical tag string
    pub fn tags(&self) -> &str {
        &self.tags
    }

    /// First-seen time, if known
    pub fn firsttime(&self) -> Option<DateTime<Utc>> {
        self.firsttime
    }

    /// Last-seen time, if known
    pub fn lasttime(&self) -> Option<DateTime<Utc>> {
        self.lasttime
    }

    /// Explicit persistence time, if one was set
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

// Wire form of an observation before canonicalization
#[derive(Deserialize)]
struct RawObservation {
    indicator: String,
    provider: String,
    #[serde(default = "default_group")]
    group: String,
    #[serde(default)]
    tags: Tags,
    #[serde(default)]
    firsttime: Option<DateTime<Utc>>,
    #[serde(default)]
    lasttime: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl From<RawObservation> for Observation {
    fn from(raw: RawObservation) -> Self {
        let mut observation = Observation::new(raw.indicator, raw.provider)
            .with_group(raw.group)
            .with_tags(raw.tags);
        if let Some(t) = raw.firsttime {
            observation = observation.with_firsttime(t);
        }
        if let Some(t) = raw.lasttime {
            observation = observation.with_lasttime(t);
        }
        if let Some(t) = raw.created_at {
            observation = observation.with_created_at(t);
        }
        observation
    }
}

/// An observation as persisted in the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObservation {
    /// Row identifier assigned by the store
    pub id: i64,
    /// The observation's fields; `created_at` is always set
    pub observation: Observation,
}
