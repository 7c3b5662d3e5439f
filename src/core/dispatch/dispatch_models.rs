// Dispatch domain models.
//
// Pure domain types; the messaging transport lives behind the Messenger port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// A customer service request, read once per broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub city_id: i32,
    pub category_id: i32,
    pub created_at: DateTime<Utc>,
}

/// What categories a worker's subscription unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entitlement {
    /// Sees listings in every category.
    Unlimited,
    /// Sees listings only in the selected categories.
    Categories(HashSet<i32>),
}

impl Entitlement {
    pub fn covers(&self, category_id: i32) -> bool {
        match self {
            Entitlement::Unlimited => true,
            Entitlement::Categories(set) => set.contains(&category_id),
        }
    }
}

/// A worker as seen at dispatch time. Derived fresh for every broadcast and
/// never cached - subscriptions and cities change under concurrent edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEligibility {
    pub worker_id: i64,
    pub city_ids: HashSet<i32>,
    pub entitlement: Entitlement,
    pub active: bool,
}

/// Outcome of one delivery attempt, as reported by the messaging collaborator.
/// Transport problems are data here, not errors - the dispatcher absorbs them.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryResult {
    Delivered,
    /// Bot blocked / chat deleted. The recipient is gone for good.
    RecipientUnreachable,
    /// Per-second limit hit; retry after the given pause.
    RateLimited(Duration),
    TransportError(String),
}

/// Tunables for the broadcast loop. Defaults match observed production
/// behavior; they are knobs, not contract.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Recipients sent concurrently in one batch.
    pub batch_size: usize,
    /// Pause between batches - the back-pressure against the aggregate rate
    /// limit of the messaging API.
    pub inter_batch_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay: Duration::from_millis(500),
        }
    }
}

/// Aggregate counts from one broadcast, for observability only. A listing is
/// broadcast at most once; nothing retries based on this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Recipients we attempted at least once.
    pub attempted: usize,
    pub delivered: usize,
    /// Recipients marked inactive after a permanent-unreachable signal.
    pub deactivated: usize,
    /// Recipients dropped after a transport error or a second rate limit.
    pub dropped: usize,
}
