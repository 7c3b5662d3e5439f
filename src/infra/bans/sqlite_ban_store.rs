// SQLite-backed ban store.
//
// One row per subject in ban_records; the core deletes rows whose counter
// drops to zero, so existence of a row means offense history.

use crate::core::bans::{BanError, BanRecord, BanStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteBanStore {
    pool: Pool<Sqlite>,
}

impl SqliteBanStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), BanError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ban_records (
                subject_id INTEGER PRIMARY KEY,
                counter INTEGER NOT NULL,
                ban_active BOOLEAN NOT NULL,
                ban_expires_at TEXT,
                permanent BOOLEAN NOT NULL DEFAULT 0,
                reason TEXT NOT NULL DEFAULT '',
                warning_count INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| BanError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn parse_expiry(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .as_deref()
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl BanStore for SqliteBanStore {
    async fn get_ban(&self, subject_id: i64) -> Result<Option<BanRecord>, BanError> {
        let row = sqlx::query("SELECT * FROM ban_records WHERE subject_id = ?")
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BanError::StorageError(e.to_string()))?;

        Ok(row.map(|row| BanRecord {
            subject_id,
            counter: row.get::<i64, _>("counter") as u32,
            ban_active: row.get("ban_active"),
            ban_expires_at: Self::parse_expiry(row.get("ban_expires_at")),
            permanent: row.get("permanent"),
            reason: row.get("reason"),
            warning_count: row.get::<i64, _>("warning_count") as u32,
        }))
    }

    async fn save_ban(&self, record: BanRecord) -> Result<(), BanError> {
        sqlx::query(
            r#"
            INSERT INTO ban_records (
                subject_id, counter, ban_active, ban_expires_at,
                permanent, reason, warning_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(subject_id) DO UPDATE SET
                counter = excluded.counter,
                ban_active = excluded.ban_active,
                ban_expires_at = excluded.ban_expires_at,
                permanent = excluded.permanent,
                reason = excluded.reason,
                warning_count = excluded.warning_count
            "#,
        )
        .bind(record.subject_id)
        .bind(record.counter as i64)
        .bind(record.ban_active)
        .bind(record.ban_expires_at.map(|t| t.to_rfc3339()))
        .bind(record.permanent)
        .bind(&record.reason)
        .bind(record.warning_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| BanError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn delete_ban(&self, subject_id: i64) -> Result<(), BanError> {
        sqlx::query("DELETE FROM ban_records WHERE subject_id = ?")
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(|e| BanError::StorageError(e.to_string()))?;
        Ok(())
    }
}
