//! Sources Repository - SQLite persistence for declared sources
//!
//! Only source declarations are stored. Compiled rules are always rebuilt
//! from the remote documents.

use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::{RemoteInfoError, Result};
use crate::store::SourceStore;
use crate::types::SourceConfig;

/// SQLite-backed source store
#[derive(Debug, Clone)]
pub struct SqliteSourceStore {
    pool: SqlitePool,
}

impl SqliteSourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the sources table if it doesn't exist
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS remote_sources (
                url TEXT PRIMARY KEY,
                pattern TEXT NOT NULL,
                interval_secs INTEGER NOT NULL CHECK (interval_secs > 0),
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    async fn put(&self, config: &SourceConfig) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO remote_sources (url, pattern, interval_secs)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&config.url)
        .bind(&config.pattern)
        .bind(config.interval_secs as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RemoteInfoError::DuplicateSource(config.url.clone()));
        }

        Ok(())
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM remote_sources WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RemoteInfoError::NotFound(url.to_string()));
        }

        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Option<SourceConfig>> {
        let row = sqlx::query(
            r#"
            SELECT url, pattern, interval_secs
            FROM remote_sources
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(hydrate_source).transpose()
    }

    async fn list(&self) -> Result<Vec<SourceConfig>> {
        let rows = sqlx::query(
            r#"
            SELECT url, pattern, interval_secs
            FROM remote_sources
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for row in rows {
            sources.push(hydrate_source(row)?);
        }
        Ok(sources)
    }
}

/// Hydrate a row into a SourceConfig
fn hydrate_source(row: SqliteRow) -> Result<SourceConfig> {
    let url: String = row.try_get("url")?;
    let pattern: String = row.try_get("pattern")?;
    let interval_secs: i64 = row.try_get("interval_secs")?;

    Ok(SourceConfig {
        url,
        pattern,
        interval_secs: interval_secs as u64,
    })
}
