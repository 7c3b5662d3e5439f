// SQLite-backed lexicon source.
//
// Tables:
// - blocked_terms: curated block lists, keyed by category name
// - allowed_terms: allow-list exceptions
//
// Admin tooling edits these tables; the core only reads them wholesale on
// reload.

use crate::core::moderation::{AllowedTerm, BlockedTerm, LexiconSource, ModerationError, TermCategory};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteLexiconStore {
    pool: Pool<Sqlite>,
}

impl SqliteLexiconStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_terms (
                text TEXT NOT NULL,
                category TEXT NOT NULL,
                PRIMARY KEY (text, category)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS allowed_terms (
                text TEXT PRIMARY KEY
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(())
    }

    /// Add a term to one of the block lists (idempotent).
    #[allow(dead_code)]
    pub async fn add_blocked_term(
        &self,
        text: &str,
        category: TermCategory,
    ) -> Result<(), ModerationError> {
        sqlx::query("INSERT OR IGNORE INTO blocked_terms (text, category) VALUES (?, ?)")
            .bind(text)
            .bind(category.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }

    /// Add an allow-list exception (idempotent).
    #[allow(dead_code)]
    pub async fn add_allowed_term(&self, text: &str) -> Result<(), ModerationError> {
        sqlx::query("INSERT OR IGNORE INTO allowed_terms (text) VALUES (?)")
            .bind(text)
            .execute(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LexiconSource for SqliteLexiconStore {
    async fn get_blocked_terms(
        &self,
        category: TermCategory,
    ) -> Result<Vec<BlockedTerm>, ModerationError> {
        let rows = sqlx::query("SELECT text FROM blocked_terms WHERE category = ?")
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| BlockedTerm {
                text: row.get("text"),
                category,
            })
            .collect())
    }

    async fn get_allowed_terms(&self) -> Result<Vec<AllowedTerm>, ModerationError> {
        let rows = sqlx::query("SELECT text FROM allowed_terms")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModerationError::StorageError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| AllowedTerm {
                text: row.get("text"),
            })
            .collect())
    }
}
