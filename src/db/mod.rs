//! Database layer for feed-archive
//!
//! Handles SQLite persistence for indicator observations.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`indicators`]: Indicator insert, provider scans, retention deletes

use crate::types::{Observation, StoredObservation};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod indicators;
mod migrations;

/// New indicator row to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewIndicator<'a> {
    /// Observed value
    pub indicator: &'a str,
    /// Visibility group
    pub group: &'a str,
    /// Feed/source identifier
    pub provider: &'a str,
    /// Canonical tag string
    pub tags: &'a str,
    /// First-seen time (unix seconds)
    pub firsttime: Option<i64>,
    /// Last-seen time (unix seconds)
    pub lasttime: Option<i64>,
    /// Persistence time (unix seconds); the store's clock is used when None
    pub created_at: Option<i64>,
}

impl<'a> From<&'a Observation> for NewIndicator<'a> {
    fn from(obs: &'a Observation) -> Self {
        Self {
            indicator: obs.indicator(),
            group: obs.group(),
            provider: obs.provider(),
            tags: obs.tags(),
            firsttime: obs.firsttime().map(|t| t.timestamp()),
            lasttime: obs.lasttime().map(|t| t.timestamp()),
            created_at: obs.created_at().map(|t| t.timestamp()),
        }
    }
}

/// Indicator record from the database
#[derive(Debug, Clone, FromRow)]
pub struct IndicatorRow {
    /// Row identifier
    pub id: i64,
    /// Observed value
    pub indicator: String,
    /// Visibility group
    pub group: String,
    /// Feed/source identifier
    pub provider: String,
    /// First-seen time (unix seconds)
    pub firsttime: Option<i64>,
    /// Last-seen time (unix seconds)
    pub lasttime: Option<i64>,
    /// Canonical tag string
    pub tags: String,
    /// Persistence time (unix seconds)
    pub created_at: i64,
}

impl IndicatorRow {
    /// First-seen time as a UTC instant
    pub fn firsttime_utc(&self) -> Option<DateTime<Utc>> {
        self.firsttime.and_then(from_unix)
    }

    /// Last-seen time as a UTC instant
    pub fn lasttime_utc(&self) -> Option<DateTime<Utc>> {
        self.lasttime.and_then(from_unix)
    }
}

impl From<IndicatorRow> for StoredObservation {
    fn from(row: IndicatorRow) -> Self {
        let firsttime = row.firsttime_utc();
        let lasttime = row.lasttime_utc();

        // Stored tags are already canonical; re-canonicalizing is a no-op
        let mut observation = Observation::new(row.indicator, row.provider)
            .with_group(row.group)
            .with_tags(row.tags);
        if let Some(t) = firsttime {
            observation = observation.with_firsttime(t);
        }
        if let Some(t) = lasttime {
            observation = observation.with_lasttime(t);
        }
        if let Some(t) = from_unix(row.created_at) {
            observation = observation.with_created_at(t);
        }

        StoredObservation {
            id: row.id,
            observation,
        }
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Database handle for feed-archive
pub struct Database {
    pool: SqlitePool,
}
