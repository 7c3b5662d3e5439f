// Lexicon store - read-only snapshot of the curated word lists.
//
// The lists live in an external store (admins edit them there); the gate only
// ever sees an immutable snapshot. Reload swaps the whole snapshot behind an
// RwLock'd Arc, so in-flight moderation calls keep the snapshot they started
// with and never observe a half-updated list.

use super::moderation_models::{AllowedTerm, BlockedTerm, ModerationError, TermCategory};
use super::normalizer::normalize;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

// ============================================================================
// SOURCE TRAIT (PORT)
// ============================================================================

/// Trait for fetching the raw word lists.
///
/// Following the same pattern as the other store ports: implementors live in
/// the infra layer.
#[async_trait]
pub trait LexiconSource: Send + Sync {
    /// All blocked terms in one category.
    async fn get_blocked_terms(
        &self,
        category: TermCategory,
    ) -> Result<Vec<BlockedTerm>, ModerationError>;

    /// The allow-list exceptions.
    async fn get_allowed_terms(&self) -> Result<Vec<AllowedTerm>, ModerationError>;
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// One immutable, pre-normalized view of every list.
#[derive(Debug, Default)]
pub struct LexiconSnapshot {
    blocked: HashMap<TermCategory, Vec<String>>,
    allowed: HashSet<String>,
}

impl LexiconSnapshot {
    /// Build a snapshot from raw terms, normalizing everything once so the
    /// matchers compare canonical forms only.
    pub fn build(blocked: Vec<BlockedTerm>, allowed: Vec<AllowedTerm>) -> Self {
        let mut by_category: HashMap<TermCategory, Vec<String>> = HashMap::new();
        for term in blocked {
            let normalized = normalize(&term.text);
            if normalized.is_empty() {
                continue;
            }
            by_category.entry(term.category).or_default().push(normalized);
        }

        let allowed = allowed
            .into_iter()
            .map(|t| normalize(&t.text))
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            blocked: by_category,
            allowed,
        }
    }

    /// Normalized terms for one category. Empty slice if the category has none.
    pub fn terms(&self, category: TermCategory) -> &[String] {
        self.blocked
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a matched fragment is an allow-listed exception.
    /// The fragment must already be normalized.
    pub fn is_allowed(&self, fragment: &str) -> bool {
        self.allowed.contains(fragment)
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Owns the current snapshot and refreshes it on demand.
pub struct LexiconStore<S: LexiconSource> {
    source: S,
    snapshot: RwLock<Arc<LexiconSnapshot>>,
}

impl<S: LexiconSource> LexiconStore<S> {
    /// Create a store with an empty snapshot. Call `reload` before first use;
    /// until then every check simply finds no matches.
    pub fn new(source: S) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(LexiconSnapshot::default())),
        }
    }

    /// Rebuild the snapshot from the source and swap it in atomically.
    /// On error the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<(), ModerationError> {
        let mut blocked = Vec::new();
        for category in TermCategory::ALL {
            blocked.extend(self.source.get_blocked_terms(category).await?);
        }
        let allowed = self.source.get_allowed_terms().await?;

        let fresh = Arc::new(LexiconSnapshot::build(blocked, allowed));
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = fresh;
        Ok(())
    }

    /// The current snapshot. Cheap Arc clone; callers keep a consistent view
    /// for the duration of one moderation call.
    pub fn snapshot(&self) -> Arc<LexiconSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource {
        blocked: Vec<BlockedTerm>,
        allowed: Vec<AllowedTerm>,
        fail: bool,
    }

    #[async_trait]
    impl LexiconSource for StaticSource {
        async fn get_blocked_terms(
            &self,
            category: TermCategory,
        ) -> Result<Vec<BlockedTerm>, ModerationError> {
            if self.fail {
                return Err(ModerationError::StorageError("down".into()));
            }
            Ok(self
                .blocked
                .iter()
                .filter(|t| t.category == category)
                .cloned()
                .collect())
        }

        async fn get_allowed_terms(&self) -> Result<Vec<AllowedTerm>, ModerationError> {
            Ok(self.allowed.clone())
        }
    }

    #[tokio::test]
    async fn reload_builds_normalized_snapshot() {
        let store = LexiconStore::new(StaticSource {
            blocked: vec![BlockedTerm {
                text: "Пр0дАм".to_string(),
                category: TermCategory::Profanity,
            }],
            allowed: vec![AllowedTerm {
                text: "ОбЕд".to_string(),
            }],
            fail: false,
        });

        store.reload().await.unwrap();
        let snapshot = store.snapshot();

        assert_eq!(snapshot.terms(TermCategory::Profanity), ["продам"]);
        assert!(snapshot.terms(TermCategory::LongForm).is_empty());
        assert!(snapshot.is_allowed("обед"));
        assert!(!snapshot.is_allowed("ужин"));
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let store = LexiconStore::new(StaticSource {
            blocked: vec![],
            allowed: vec![],
            fail: true,
        });

        let before = store.snapshot();
        assert!(store.reload().await.is_err());
        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn snapshot_survives_a_reload() {
        let store = LexiconStore::new(StaticSource {
            blocked: vec![BlockedTerm {
                text: "спам".to_string(),
                category: TermCategory::ShortForm,
            }],
            allowed: vec![],
            fail: false,
        });

        // An in-flight call holds the old snapshot while reload swaps in a new one
        let held = store.snapshot();
        store.reload().await.unwrap();
        assert!(held.terms(TermCategory::ShortForm).is_empty());
        assert_eq!(store.snapshot().terms(TermCategory::ShortForm), ["спам"]);
    }
}
