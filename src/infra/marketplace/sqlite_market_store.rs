// SQLite-backed marketplace store - workers with their subscriptions, and
// listings with the dispatch bookkeeping.
//
// Tables:
// - workers: activity flag and unlimited-entitlement flag
// - worker_cities / worker_categories: membership sets
// - listings: accepted listings, view counter, dispatched flag

use crate::core::dispatch::{
    DispatchError, Entitlement, Listing, ListingStore, WorkerEligibility, WorkerStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashSet;

pub struct SqliteMarketStore {
    pool: Pool<Sqlite>,
}

impl SqliteMarketStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), DispatchError> {
        for ddl in [
            r#"
            CREATE TABLE IF NOT EXISTS workers (
                worker_id INTEGER PRIMARY KEY,
                active BOOLEAN NOT NULL DEFAULT 1,
                unlimited BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS worker_cities (
                worker_id INTEGER NOT NULL,
                city_id INTEGER NOT NULL,
                PRIMARY KEY (worker_id, city_id)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS worker_categories (
                worker_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (worker_id, category_id)
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                views INTEGER NOT NULL DEFAULT 0,
                dispatched BOOLEAN NOT NULL DEFAULT 0
            );
            "#,
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        }
        Ok(())
    }

    /// Insert or replace a worker with their membership sets. The profile
    /// screens that normally maintain these rows live outside this crate.
    #[allow(dead_code)]
    pub async fn upsert_worker(&self, worker: &WorkerEligibility) -> Result<(), DispatchError> {
        let unlimited = worker.entitlement == Entitlement::Unlimited;
        sqlx::query(
            r#"
            INSERT INTO workers (worker_id, active, unlimited)
            VALUES (?, ?, ?)
            ON CONFLICT(worker_id) DO UPDATE SET
                active = excluded.active,
                unlimited = excluded.unlimited
            "#,
        )
        .bind(worker.worker_id)
        .bind(worker.active)
        .bind(unlimited)
        .execute(&self.pool)
        .await
        .map_err(|e| DispatchError::StorageError(e.to_string()))?;

        sqlx::query("DELETE FROM worker_cities WHERE worker_id = ?")
            .bind(worker.worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        for city_id in &worker.city_ids {
            sqlx::query("INSERT INTO worker_cities (worker_id, city_id) VALUES (?, ?)")
                .bind(worker.worker_id)
                .bind(city_id)
                .execute(&self.pool)
                .await
                .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        }

        sqlx::query("DELETE FROM worker_categories WHERE worker_id = ?")
            .bind(worker.worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        if let Entitlement::Categories(categories) = &worker.entitlement {
            for category_id in categories {
                sqlx::query(
                    "INSERT INTO worker_categories (worker_id, category_id) VALUES (?, ?)",
                )
                .bind(worker.worker_id)
                .bind(category_id)
                .execute(&self.pool)
                .await
                .map_err(|e| DispatchError::StorageError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Record a freshly accepted listing; returns its id. Dispatch picks it
    /// up via `claim_undispatched`.
    #[allow(dead_code)]
    pub async fn insert_listing(
        &self,
        city_id: i32,
        category_id: i32,
    ) -> Result<i64, DispatchError> {
        let row = sqlx::query(
            r#"
            INSERT INTO listings (city_id, category_id, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(city_id)
        .bind(category_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        Ok(row.get("id"))
    }

    async fn id_set(&self, table: &str, worker_id: i64) -> Result<HashSet<i32>, DispatchError> {
        // Table names come from a fixed internal set, never from input.
        let query = format!("SELECT * FROM {table} WHERE worker_id = ?");
        let rows = sqlx::query(&query)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.get::<i32, _>(1)).collect())
    }
}

#[async_trait]
impl WorkerStore for SqliteMarketStore {
    async fn get_eligible_worker_candidates(
        &self,
        city_id: i32,
    ) -> Result<Vec<WorkerEligibility>, DispatchError> {
        let rows = sqlx::query(
            r#"
            SELECT w.worker_id, w.active, w.unlimited
            FROM workers w
            JOIN worker_cities c ON c.worker_id = w.worker_id
            WHERE c.city_id = ? AND w.active = 1
            ORDER BY w.worker_id
            "#,
        )
        .bind(city_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DispatchError::StorageError(e.to_string()))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let worker_id: i64 = row.get("worker_id");
            let unlimited: bool = row.get("unlimited");
            let entitlement = if unlimited {
                Entitlement::Unlimited
            } else {
                Entitlement::Categories(self.id_set("worker_categories", worker_id).await?)
            };
            candidates.push(WorkerEligibility {
                worker_id,
                city_ids: self.id_set("worker_cities", worker_id).await?,
                entitlement,
                active: row.get("active"),
            });
        }
        Ok(candidates)
    }

    async fn set_worker_active(&self, worker_id: i64, active: bool) -> Result<(), DispatchError> {
        sqlx::query("UPDATE workers SET active = ? WHERE worker_id = ?")
            .bind(active)
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for SqliteMarketStore {
    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, DispatchError> {
        let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;

        Ok(row.map(|row| {
            let created_at: String = row.get("created_at");
            Listing {
                id,
                city_id: row.get("city_id"),
                category_id: row.get("category_id"),
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }
        }))
    }

    async fn increment_listing_views(&self, id: i64, delta: i64) -> Result<(), DispatchError> {
        sqlx::query("UPDATE listings SET views = views + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DispatchError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn claim_undispatched(&self, limit: usize) -> Result<Vec<i64>, DispatchError> {
        let rows = sqlx::query(
            r#"
            UPDATE listings SET dispatched = 1
            WHERE id IN (
                SELECT id FROM listings WHERE dispatched = 0 ORDER BY id LIMIT ?
            )
            RETURNING id
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DispatchError::StorageError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteMarketStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteMarketStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    fn worker(id: i64, cities: &[i32], entitlement: Entitlement) -> WorkerEligibility {
        WorkerEligibility {
            worker_id: id,
            city_ids: cities.iter().copied().collect(),
            entitlement,
            active: true,
        }
    }

    #[tokio::test]
    async fn candidates_come_back_with_entitlements() {
        let store = store().await;
        store
            .upsert_worker(&worker(1, &[1, 2], Entitlement::Unlimited))
            .await
            .unwrap();
        store
            .upsert_worker(&worker(
                2,
                &[1],
                Entitlement::Categories([10, 20].into_iter().collect()),
            ))
            .await
            .unwrap();
        store
            .upsert_worker(&worker(3, &[5], Entitlement::Unlimited))
            .await
            .unwrap();

        let candidates = store.get_eligible_worker_candidates(1).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].worker_id, 1);
        assert_eq!(candidates[0].entitlement, Entitlement::Unlimited);
        assert_eq!(candidates[0].city_ids, [1, 2].into_iter().collect());
        assert_eq!(
            candidates[1].entitlement,
            Entitlement::Categories([10, 20].into_iter().collect())
        );
    }

    #[tokio::test]
    async fn deactivated_workers_stop_being_candidates() {
        let store = store().await;
        store
            .upsert_worker(&worker(1, &[1], Entitlement::Unlimited))
            .await
            .unwrap();

        store.set_worker_active(1, false).await.unwrap();
        assert!(store
            .get_eligible_worker_candidates(1)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn listings_are_claimed_at_most_once() {
        let store = store().await;
        let a = store.insert_listing(1, 10).await.unwrap();
        let b = store.insert_listing(1, 20).await.unwrap();
        let c = store.insert_listing(2, 10).await.unwrap();

        let first = store.claim_undispatched(2).await.unwrap();
        assert_eq!(first, vec![a, b]);
        let second = store.claim_undispatched(10).await.unwrap();
        assert_eq!(second, vec![c]);
        assert!(store.claim_undispatched(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn views_accumulate() {
        let store = store().await;
        let id = store.insert_listing(1, 10).await.unwrap();

        store.increment_listing_views(id, 1).await.unwrap();
        store.increment_listing_views(id, 1).await.unwrap();

        let row = sqlx::query("SELECT views FROM listings WHERE id = ?")
            .bind(id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("views"), 2);
    }

    #[tokio::test]
    async fn get_listing_round_trips() {
        let store = store().await;
        let id = store.insert_listing(7, 42).await.unwrap();

        let loaded = store.get_listing(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.city_id, 7);
        assert_eq!(loaded.category_id, 42);

        assert!(store.get_listing(9999).await.unwrap().is_none());
    }
}
