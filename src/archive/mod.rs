//! Indicator archive with an in-memory dedup index
//!
//! [`Archive`] persists indicator observations and answers "has this exact
//! observation already been archived for this provider?" from memory. The
//! index for a provider is loaded from the database the first time that
//! provider is searched and is kept current with every write made through
//! the same `Archive`. Writes from other processes are not observed until the
//! provider is reloaded.

mod cache;


pub use cache::{CachedObservation, ProviderCache, ProviderIndex};

use crate::config::ArchiveConfig;
use crate::db::{Database, NewIndicator};
use crate::error::Result;
use crate::types::{Observation, StoredObservation};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Persistent indicator store with a per-provider dedup cache
///
/// Designed for a single logical caller: cache updates go through `&mut self`
/// and no internal locking is performed.
pub struct Archive {
    db: Database,
    cache: ProviderCache,
    retention_days: u32,
}

impl Archive {
    /// Open or create the archive at `path`
    ///
    /// Fails with [`Error::StorageInit`](crate::Error::StorageInit) if the
    /// database cannot be created or opened. The cache starts empty.
    pub async fn open(path: &Path, options: &ArchiveConfig) -> Result<Self> {
        let db = Database::new(path).await?;
        info!(path = %path.display(), cache_capacity = options.cache_capacity, "opened indicator archive");
        Ok(Self::with_cache(
            db,
            ProviderCache::new(options.cache_capacity),
            options.retention_days,
        ))
    }

    /// Open the archive at the configured `database_path`
    pub async fn from_config(options: &ArchiveConfig) -> Result<Self> {
        Self::open(&options.database_path, options).await
    }

    /// Build an archive around an existing database and cache
    pub fn with_cache(db: Database, cache: ProviderCache, retention_days: u32) -> Self {
        Self {
            db,
            cache,
            retention_days,
        }
    }

    /// Load every archived observation for `provider` into memory
    ///
    /// Replaces any index already held for `provider`; evicts the least
    /// recently used provider when the cache is full. Returns the number of
    /// distinct indicators loaded.
    pub async fn cache_provider(&mut self, provider: &str) -> Result<usize> {
        let mut index = ProviderIndex::new();
        let rows = self
            .db
            .scan_provider(provider, |row| {
                let cached = CachedObservation {
                    firsttime: row.firsttime_utc(),
                    lasttime: row.lasttime_utc(),
                    group: row.group,
                    tags: row.tags,
                };
                // Rows arrive oldest first, so the newest sighting wins
                index.insert(row.indicator, cached);
            })
            .await?;

        let loaded = index.len();
        if let Some(evicted) = self.cache.insert(provider, index) {
            debug!(provider = %evicted, "evicted provider from indicator cache");
        }

        info!(provider, rows, indicators = loaded, "cached provider in memory");
        Ok(loaded)
    }

    /// Whether `observation` is already archived for its provider
    ///
    /// True iff the provider's cache holds the indicator with the same group
    /// and tags, and with the same `firsttime`/`lasttime` for whichever of
    /// those the observation supplies. Loads the provider first if it isn't
    /// resident.
    pub async fn search(&mut self, observation: &Observation) -> Result<bool> {
        let provider = observation.provider();
        if !self.cache.contains(provider) {
            self.cache_provider(provider).await?;
        }

        Ok(self
            .cache
            .get(provider)
            .and_then(|index| index.get(observation.indicator()))
            .is_some_and(|cached| cached.matches(observation)))
    }

    /// Persist `observation` as a new row in its own transaction
    ///
    /// Always inserts; callers dedup with [`search`](Self::search) first or
    /// use [`record`](Self::record). Returns the assigned row ID.
    pub async fn create(&mut self, observation: &Observation) -> Result<i64> {
        let id = self
            .db
            .insert_indicator(&NewIndicator::from(observation))
            .await?;
        self.remember(observation);
        debug!(
            id,
            indicator = observation.indicator(),
            provider = observation.provider(),
            "archived observation"
        );
        Ok(id)
    }

    /// Persist `observation` inside a caller-managed transaction
    ///
    /// The insert runs in a savepoint nested in `conn`'s open transaction.
    /// The cache is updated immediately; if the outer transaction is rolled
    /// back, call [`clear_cache`](Self::clear_cache) to resynchronize.
    pub async fn create_in(
        &mut self,
        conn: &mut SqliteConnection,
        observation: &Observation,
    ) -> Result<i64> {
        let id = Database::insert_indicator_in(conn, &NewIndicator::from(observation)).await?;
        self.remember(observation);
        Ok(id)
    }

    /// Begin a transaction for use with [`create_in`](Self::create_in)
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.db.pool().begin().await?)
    }

    /// Archive `observation` unless an identical one is already known
    ///
    /// Returns the new row ID, or `None` when the observation was a repeat.
    pub async fn record(&mut self, observation: &Observation) -> Result<Option<i64>> {
        if self.search(observation).await? {
            return Ok(None);
        }
        self.create(observation).await.map(Some)
    }

    /// Delete observations archived more than `retention_days` days ago
    ///
    /// Returns the number of rows deleted. The in-memory cache is left as is.
    pub async fn cleanup(&self, retention_days: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        self.cleanup_before(cutoff).await
    }

    /// [`cleanup`](Self::cleanup) with the configured retention period
    pub async fn cleanup_expired(&self) -> Result<u64> {
        self.cleanup(self.retention_days).await
    }

    /// Delete observations whose `created_at` is strictly before `cutoff`
    pub async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = self.db.delete_created_before(cutoff.timestamp()).await?;
        info!(%cutoff, deleted, "purged expired observations");
        Ok(deleted)
    }

    /// Drop every cached provider index
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Whether `provider`'s index is resident in memory
    pub fn is_cached(&self, provider: &str) -> bool {
        self.cache.contains(provider)
    }

    /// Read access to the provider cache
    pub fn cache(&self) -> &ProviderCache {
        &self.cache
    }

    /// Count archived rows, optionally for one provider
    pub async fn count(&self, provider: Option<&str>) -> Result<i64> {
        self.db.count_indicators(provider).await
    }

    /// Every archived observation for `provider`, oldest first
    pub async fn observations(&self, provider: &str) -> Result<Vec<StoredObservation>> {
        let rows = self.db.list_provider(provider).await?;
        Ok(rows.into_iter().map(StoredObservation::from).collect())
    }

    /// Configured retention period in days
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// The underlying database handle
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Close the underlying connection pool
    pub async fn close(self) {
        self.db.close().await;
    }

    fn remember(&mut self, observation: &Observation) {
        if let Some(index) = self.cache.get_mut(observation.provider()) {
            index.insert(
                observation.indicator().to_string(),
                CachedObservation::from(observation),
            );
        }
    }
}
