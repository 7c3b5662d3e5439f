// Ban escalation service - core state machine for repeat offenders.
//
// Clean -> Suspended(1) -> Suspended(2) -> Permanent(3). Offenses escalate,
// pardons walk back down, and a per-subject lock serializes concurrent
// updates so escalation is never lost to a read-modify-write race.
//
// NO Telegram dependencies here - just pure domain logic.

use super::ban_models::BanRecord;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Temporary suspensions last this long.
const TEMP_BAN_HOURS: i64 = 24;

/// Offense count at which a ban becomes permanent.
const PERMANENT_THRESHOLD: u32 = 3;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum BanError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting ban records.
#[async_trait]
pub trait BanStore: Send + Sync {
    async fn get_ban(&self, subject_id: i64) -> Result<Option<BanRecord>, BanError>;

    /// Insert or replace the record for `record.subject_id`.
    async fn save_ban(&self, record: BanRecord) -> Result<(), BanError>;

    async fn delete_ban(&self, subject_id: i64) -> Result<(), BanError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct BanEscalationService<S: BanStore> {
    store: S,
    /// Per-subject mutexes guarding the read-modify-write cycle.
    /// Entries are tiny and subjects finite, so the table is never swept.
    subject_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl<S: BanStore> BanEscalationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            subject_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, subject_id: i64) -> Arc<Mutex<()>> {
        self.subject_locks
            .entry(subject_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register an offense and escalate.
    ///
    /// First offense creates a 24h suspension; the third makes it permanent.
    /// Offenses against an already permanent ban are no-ops.
    pub async fn offense(&self, subject_id: i64, reason: &str) -> Result<BanRecord, BanError> {
        let lock = self.lock_for(subject_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let record = match self.store.get_ban(subject_id).await? {
            None => BanRecord {
                subject_id,
                counter: 1,
                ban_active: true,
                ban_expires_at: Some(now + Duration::hours(TEMP_BAN_HOURS)),
                permanent: false,
                reason: reason.to_string(),
                warning_count: 0,
            },
            Some(existing) if existing.permanent => {
                // Already maximally sanctioned
                return Ok(existing);
            }
            Some(mut existing) => {
                existing.counter += 1;
                existing.ban_active = true;
                existing.reason = reason.to_string();
                if existing.counter >= PERMANENT_THRESHOLD {
                    existing.permanent = true;
                    existing.ban_expires_at = None;
                } else {
                    existing.ban_expires_at = Some(now + Duration::hours(TEMP_BAN_HOURS));
                }
                existing
            }
        };

        self.store.save_ban(record.clone()).await?;
        tracing::info!(
            subject_id,
            counter = record.counter,
            permanent = record.permanent,
            reason,
            "Registered offense"
        );
        Ok(record)
    }

    /// Walk one step back down the ladder (admin or automatic pardon).
    ///
    /// At `counter <= 1` the record is deleted outright. A permanent ban is
    /// demoted rather than deleted so the offense history survives. Returns
    /// the remaining record, if any.
    #[allow(dead_code)]
    pub async fn pardon(&self, subject_id: i64) -> Result<Option<BanRecord>, BanError> {
        let lock = self.lock_for(subject_id);
        let _guard = lock.lock().await;

        let Some(mut record) = self.store.get_ban(subject_id).await? else {
            return Ok(None);
        };

        if record.counter <= 1 {
            self.store.delete_ban(subject_id).await?;
            tracing::info!(subject_id, "Pardon cleared last offense, record deleted");
            return Ok(None);
        }

        record.counter -= 1;
        record.permanent = false;
        record.ban_active = false;
        record.ban_expires_at = None;

        self.store.save_ban(record.clone()).await?;
        tracing::info!(subject_id, counter = record.counter, "Pardon applied");
        Ok(Some(record))
    }

    /// Issue a soft warning without touching the escalation counter.
    /// Returns the new warning count.
    ///
    /// A warn-only record carries `counter = 0`, so the first real offense
    /// still starts the ladder at 1.
    #[allow(dead_code)]
    pub async fn warn(&self, subject_id: i64, reason: &str) -> Result<u32, BanError> {
        let lock = self.lock_for(subject_id);
        let _guard = lock.lock().await;

        let mut record = self.store.get_ban(subject_id).await?.unwrap_or(BanRecord {
            subject_id,
            counter: 0,
            ban_active: false,
            ban_expires_at: None,
            permanent: false,
            reason: reason.to_string(),
            warning_count: 0,
        });

        record.warning_count += 1;
        let count = record.warning_count;
        self.store.save_ban(record).await?;
        Ok(count)
    }

    /// Whether the subject is currently banned. Read-only: an expired
    /// temporary ban reads as unbanned even before housekeeping clears it
    /// (the periodic sweep is someone else's job).
    pub async fn is_blocked(&self, subject_id: i64) -> Result<bool, BanError> {
        Ok(self
            .store
            .get_ban(subject_id)
            .await?
            .map(|r| r.blocks_at(Utc::now()))
            .unwrap_or(false))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBanStore {
        records: DashMap<i64, BanRecord>,
    }

    impl MockBanStore {
        fn new() -> Self {
            Self {
                records: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl BanStore for MockBanStore {
        async fn get_ban(&self, subject_id: i64) -> Result<Option<BanRecord>, BanError> {
            Ok(self.records.get(&subject_id).map(|r| r.clone()))
        }

        async fn save_ban(&self, record: BanRecord) -> Result<(), BanError> {
            self.records.insert(record.subject_id, record);
            Ok(())
        }

        async fn delete_ban(&self, subject_id: i64) -> Result<(), BanError> {
            self.records.remove(&subject_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_offense_creates_temporary_ban() {
        let service = BanEscalationService::new(MockBanStore::new());

        let record = service.offense(7, "matched: спам").await.unwrap();

        assert_eq!(record.counter, 1);
        assert!(record.ban_active);
        assert!(!record.permanent);
        assert!(record.ban_expires_at.unwrap() > Utc::now());
        assert!(service.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn third_offense_becomes_permanent() {
        let service = BanEscalationService::new(MockBanStore::new());

        service.offense(7, "one").await.unwrap();
        service.offense(7, "two").await.unwrap();
        let record = service.offense(7, "three").await.unwrap();

        assert_eq!(record.counter, 3);
        assert!(record.permanent);
        assert!(record.ban_active);
        assert!(record.ban_expires_at.is_none());

        // Further offenses are no-ops
        let again = service.offense(7, "four").await.unwrap();
        assert_eq!(again.counter, 3);
        assert_eq!(again.reason, "three");
    }

    #[tokio::test]
    async fn pardon_on_single_offense_deletes_record() {
        let service = BanEscalationService::new(MockBanStore::new());

        service.offense(7, "oops").await.unwrap();
        assert!(service.pardon(7).await.unwrap().is_none());
        assert!(!service.is_blocked(7).await.unwrap());

        // Pardoning a clean subject is harmless
        assert!(service.pardon(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pardon_demotes_permanent_ban() {
        let service = BanEscalationService::new(MockBanStore::new());

        for reason in ["one", "two", "three"] {
            service.offense(7, reason).await.unwrap();
        }

        let record = service.pardon(7).await.unwrap().unwrap();
        assert_eq!(record.counter, 2);
        assert!(!record.permanent);
        assert!(!record.ban_active);
        assert!(record.ban_expires_at.is_none());
        assert!(!service.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn expired_temporary_ban_reads_as_unbanned() {
        let store = MockBanStore::new();
        store
            .save_ban(BanRecord {
                subject_id: 7,
                counter: 1,
                ban_active: true,
                ban_expires_at: Some(Utc::now() - Duration::hours(1)),
                permanent: false,
                reason: "old".to_string(),
                warning_count: 0,
            })
            .await
            .unwrap();

        let service = BanEscalationService::new(store);
        assert!(!service.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn warnings_accumulate_without_banning() {
        let service = BanEscalationService::new(MockBanStore::new());

        assert_eq!(service.warn(7, "chat leak").await.unwrap(), 1);
        assert_eq!(service.warn(7, "chat leak").await.unwrap(), 2);
        assert!(!service.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn warnings_do_not_advance_the_escalation_ladder() {
        let service = BanEscalationService::new(MockBanStore::new());

        service.warn(7, "chat leak").await.unwrap();

        // The ladder starts at 1 regardless of prior warnings
        let first = service.offense(7, "one").await.unwrap();
        assert_eq!(first.counter, 1);

        let second = service.offense(7, "two").await.unwrap();
        assert_eq!(second.counter, 2);
        assert!(!second.permanent);

        let third = service.offense(7, "three").await.unwrap();
        assert!(third.permanent);
        // Warning history survives escalation
        assert_eq!(third.warning_count, 1);
    }

    #[tokio::test]
    async fn concurrent_offenses_all_count() {
        let service = Arc::new(BanEscalationService::new(MockBanStore::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(
                async move { service.offense(7, "race").await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Lost updates would leave the counter below the permanent threshold
        let record = service.store.get_ban(7).await.unwrap().unwrap();
        assert_eq!(record.counter, 3);
        assert!(record.permanent);
    }
}
