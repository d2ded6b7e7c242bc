//! Indicator persistence: inserts, provider scans, retention deletes.

use crate::error::DatabaseError;
use crate::{Error, Result};
use futures::TryStreamExt;
use sqlx::{Connection, SqliteConnection};

use super::{Database, IndicatorRow, NewIndicator};

impl Database {
    /// Insert an indicator row in its own transaction
    ///
    /// Returns the assigned row ID.
    pub async fn insert_indicator(&self, new: &NewIndicator<'_>) -> Result<i64> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        Self::insert_indicator_in(&mut conn, new).await
    }

    /// Insert an indicator row on a caller-supplied connection
    ///
    /// Opens a transaction on `conn`; if `conn` is already inside a
    /// transaction this becomes a savepoint nested in it, and the row is only
    /// durable once the outer transaction commits.
    pub async fn insert_indicator_in(
        conn: &mut SqliteConnection,
        new: &NewIndicator<'_>,
    ) -> Result<i64> {
        let mut tx = conn.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO indicators (
                indicator, "group", provider, firsttime, lasttime, tags, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, COALESCE(?, CAST(strftime('%s', 'now') AS INTEGER)))
            "#,
        )
        .bind(new.indicator)
        .bind(new.group)
        .bind(new.provider)
        .bind(new.firsttime)
        .bind(new.lasttime)
        .bind(new.tags)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert indicator: {}",
                e
            )))
        })?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit indicator insert: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Stream every row for a provider through `visit`
    ///
    /// Rows are visited in insertion order, so for an indicator seen more
    /// than once the newest row is visited last. Returns the number of rows
    /// visited.
    pub async fn scan_provider<F>(&self, provider: &str, mut visit: F) -> Result<usize>
    where
        F: FnMut(IndicatorRow),
    {
        let mut rows = sqlx::query_as::<_, IndicatorRow>(
            r#"
            SELECT id, indicator, "group", provider, firsttime, lasttime, tags, created_at
            FROM indicators
            WHERE provider = ?
            ORDER BY id ASC
            "#,
        )
        .bind(provider)
        .fetch(&self.pool);

        let mut visited = 0;
        while let Some(row) = rows.try_next().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to scan indicators for provider {}: {}",
                provider, e
            )))
        })? {
            visit(row);
            visited += 1;
        }

        Ok(visited)
    }

    /// Get every row for a provider, oldest first
    pub async fn list_provider(&self, provider: &str) -> Result<Vec<IndicatorRow>> {
        let mut rows = Vec::new();
        self.scan_provider(provider, |row| rows.push(row)).await?;
        Ok(rows)
    }

    /// Count rows, optionally restricted to one provider
    pub async fn count_indicators(&self, provider: Option<&str>) -> Result<i64> {
        let count: i64 = match provider {
            Some(provider) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM indicators WHERE provider = ?")
                    .bind(provider)
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM indicators")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count indicators: {}",
                e
            )))
        })?;

        Ok(count)
    }

    /// Delete rows whose `created_at` is strictly before `cutoff` (unix seconds)
    ///
    /// Returns the number of rows deleted.
    pub async fn delete_created_before(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM indicators WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete expired indicators: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
