//! SQLite implementation of the warden attempt repository.
//!
//! Timestamps are stored as unix seconds; blocks and offense counts are
//! keyed by address. Call [`SqliteAttemptRepository::migrate`] once before
//! use to create the schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::{
    Error,
    attempt::{AttemptRecord, AttemptStats, BlockEntry},
    error::StorageError,
    repositories::AttemptRepository,
};

/// SQLite repository for attempt tracking and block state.
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    /// Create a new SQLite attempt repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet. Idempotent.
    pub async fn migrate(&self) -> Result<(), Error> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                principal TEXT,
                address TEXT NOT NULL,
                succeeded INTEGER NOT NULL,
                attempted_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_login_attempts_address_time
                ON login_attempts (address, attempted_at)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS address_blocks (
                address TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                failed_attempts INTEGER NOT NULL,
                prior_blocks INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS address_offenses (
                address TEXT PRIMARY KEY,
                block_count INTEGER NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to run schema migration");
                    StorageError::Database("Failed to run schema migration".to_string())
                })?;
        }

        Ok(())
    }
}

/// Internal struct for attempt stats query
#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptStats {
    count: i32,
    latest_at: Option<i64>,
}

/// Internal struct for block entry rows
#[derive(Debug, sqlx::FromRow)]
struct SqliteBlockEntry {
    address: String,
    created_at: i64,
    expires_at: i64,
    failed_attempts: i64,
    prior_blocks: i64,
}

impl From<SqliteBlockEntry> for BlockEntry {
    fn from(row: SqliteBlockEntry) -> Self {
        BlockEntry {
            address: row.address,
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
            expires_at: DateTime::from_timestamp(row.expires_at, 0).expect("Invalid timestamp"),
            failed_attempts: row.failed_attempts as u32,
            prior_blocks: row.prior_blocks as u32,
        }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (principal, address, succeeded, attempted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.principal.as_ref().map(|p| p.as_str()))
        .bind(&record.address)
        .bind(record.succeeded)
        .bind(record.attempted_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record attempt");
            StorageError::Database("Failed to record attempt".to_string())
        })?;

        Ok(())
    }

    async fn attempt_stats(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptStats>(
            r#"
            SELECT
                COUNT(*) as count,
                MAX(attempted_at) as latest_at
            FROM login_attempts
            WHERE address = ? AND succeeded = 0 AND attempted_at >= ?
            "#,
        )
        .bind(address)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get attempt stats");
            StorageError::Database("Failed to get attempt stats".to_string())
        })?;

        Ok(AttemptStats {
            failed_count: row.count as u32,
            latest_at: row.latest_at.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }

    async fn prune_attempts(&self, address: &str, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE address = ? AND attempted_at < ?")
            .bind(address)
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to prune attempts");
                StorageError::Database("Failed to prune attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn clear_attempts(&self, address: &str) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to clear attempts");
                StorageError::Database("Failed to clear attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn get_block(&self, address: &str) -> Result<Option<BlockEntry>, Error> {
        let row = sqlx::query_as::<_, SqliteBlockEntry>(
            r#"
            SELECT address, created_at, expires_at, failed_attempts, prior_blocks
            FROM address_blocks
            WHERE address = ?
            "#,
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get block entry");
            StorageError::Database("Failed to get block entry".to_string())
        })?;

        Ok(row.map(BlockEntry::from))
    }

    async fn put_block(&self, entry: &BlockEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO address_blocks
                (address, created_at, expires_at, failed_attempts, prior_blocks)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.address)
        .bind(entry.created_at.timestamp())
        .bind(entry.expires_at.timestamp())
        .bind(entry.failed_attempts as i64)
        .bind(entry.prior_blocks as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to store block entry");
            StorageError::Database("Failed to store block entry".to_string())
        })?;

        Ok(())
    }

    async fn delete_block(&self, address: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM address_blocks WHERE address = ?")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete block entry");
                StorageError::Database("Failed to delete block entry".to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn offense_count(&self, address: &str) -> Result<u32, Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT block_count FROM address_offenses WHERE address = ?")
                .bind(address)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to get offense count");
                    StorageError::Database("Failed to get offense count".to_string())
                })?;

        Ok(row.map(|(count,)| count as u32).unwrap_or(0))
    }

    async fn set_offense_count(&self, address: &str, count: u32) -> Result<(), Error> {
        let query = if count == 0 {
            sqlx::query("DELETE FROM address_offenses WHERE address = ?").bind(address)
        } else {
            sqlx::query("INSERT OR REPLACE INTO address_offenses (address, block_count) VALUES (?, ?)")
                .bind(address)
                .bind(count as i64)
        };

        query.execute(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to set offense count");
            StorageError::Database("Failed to set offense count".to_string())
        })?;

        Ok(())
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to cleanup old attempts");
                StorageError::Database("Failed to cleanup old attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }
}
