// Broadcast dispatcher - delivers a freshly accepted listing to every
// eligible worker.
//
// Recipients are processed in fixed-size batches: one batch is sent
// concurrently and awaited to completion, then the dispatcher sleeps before
// the next batch. The inter-batch pause is the back-pressure against the
// messaging API's aggregate rate limit.
//
// Per-recipient failures never fail the batch:
// - unreachable recipients are deactivated and skipped,
// - a rate-limit signal earns exactly one retry for that recipient,
// - anything else is logged and dropped.

use super::dispatch_models::{
    DeliveryResult, DispatchConfig, DispatchReport, Listing, WorkerEligibility,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::sleep;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// PORTS
// ============================================================================

/// The external per-recipient messaging API. Outcomes are data, not errors -
/// the dispatcher decides what each one means.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, recipient_id: i64, text: &str) -> DeliveryResult;

    async fn send_photo(&self, recipient_id: i64, photo_ref: &str, caption: &str)
        -> DeliveryResult;
}

/// Worker/subscription collaborator, read fresh at dispatch time.
#[async_trait]
pub trait WorkerStore: Send + Sync {
    /// Active workers signed up for this city, with their entitlements.
    async fn get_eligible_worker_candidates(
        &self,
        city_id: i32,
    ) -> Result<Vec<WorkerEligibility>, DispatchError>;

    async fn set_worker_active(&self, worker_id: i64, active: bool) -> Result<(), DispatchError>;
}

/// Listing collaborator.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, DispatchError>;

    /// Best-effort delivery counter.
    async fn increment_listing_views(&self, id: i64, delta: i64) -> Result<(), DispatchError>;

    /// Atomically claim listings that have been accepted but not yet
    /// broadcast, so each listing is dispatched at most once.
    async fn claim_undispatched(&self, limit: usize) -> Result<Vec<i64>, DispatchError>;
}

// ============================================================================
// ELIGIBILITY MATCHER
// ============================================================================

/// Resolves which workers are entitled to see a listing. Pure read; the
/// candidate set may change between this call and delivery, which is fine -
/// no lock is held.
pub struct EligibilityMatcher<W: WorkerStore> {
    workers: Arc<W>,
}

impl<W: WorkerStore> EligibilityMatcher<W> {
    pub fn new(workers: Arc<W>) -> Self {
        Self { workers }
    }

    pub async fn eligible_workers(
        &self,
        city_id: i32,
        category_id: i32,
    ) -> Result<Vec<WorkerEligibility>, DispatchError> {
        let candidates = self.workers.get_eligible_worker_candidates(city_id).await?;
        Ok(candidates
            .into_iter()
            .filter(|w| {
                w.active && w.city_ids.contains(&city_id) && w.entitlement.covers(category_id)
            })
            .collect())
    }
}

// ============================================================================
// BROADCAST DISPATCHER
// ============================================================================

pub struct BroadcastDispatcher<W, L, M>
where
    W: WorkerStore + 'static,
    L: ListingStore + 'static,
    M: Messenger + 'static,
{
    workers: Arc<W>,
    listings: Arc<L>,
    messenger: Arc<M>,
    config: DispatchConfig,
    /// Outstanding fire-and-forget broadcasts, for diagnostics.
    in_flight: AtomicUsize,
}

impl<W, L, M> BroadcastDispatcher<W, L, M>
where
    W: WorkerStore + 'static,
    L: ListingStore + 'static,
    M: Messenger + 'static,
{
    pub fn new(workers: Arc<W>, listings: Arc<L>, messenger: Arc<M>, config: DispatchConfig) -> Self {
        Self {
            workers,
            listings,
            messenger,
            config,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Broadcast one listing to the given recipients and report the counts.
    pub async fn dispatch(
        &self,
        listing: &Listing,
        text: &str,
        recipients: Vec<WorkerEligibility>,
    ) -> DispatchReport {
        let text: Arc<str> = Arc::from(text);
        let mut report = DispatchReport::default();

        for (index, batch) in recipients.chunks(self.config.batch_size.max(1)).enumerate() {
            if index > 0 {
                sleep(self.config.inter_batch_delay).await;
            }

            let mut tasks = JoinSet::new();
            for worker in batch {
                tasks.spawn(deliver_one(
                    Arc::clone(&self.messenger),
                    Arc::clone(&self.workers),
                    Arc::clone(&self.listings),
                    listing.id,
                    worker.worker_id,
                    Arc::clone(&text),
                ));
            }

            // The whole batch finishes - successes and failures alike -
            // before the next one starts.
            while let Some(joined) = tasks.join_next().await {
                report.attempted += 1;
                match joined {
                    Ok(RecipientOutcome::Delivered) => report.delivered += 1,
                    Ok(RecipientOutcome::Deactivated) => report.deactivated += 1,
                    Ok(RecipientOutcome::Dropped) => report.dropped += 1,
                    Err(err) => {
                        tracing::error!(listing_id = listing.id, "Delivery task panicked: {err}");
                        report.dropped += 1;
                    }
                }
            }
        }

        report
    }

    /// Fire-and-forget broadcast. The submitter already got their ack; this
    /// runs in the background with no cancellation path, tracked only by the
    /// in-flight gauge.
    pub fn spawn_dispatch(
        self: &Arc<Self>,
        listing: Listing,
        text: String,
        recipients: Vec<WorkerEligibility>,
    ) {
        let dispatcher = Arc::clone(self);
        dispatcher.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let report = dispatcher.dispatch(&listing, &text, recipients).await;
            tracing::info!(
                listing_id = listing.id,
                attempted = report.attempted,
                delivered = report.delivered,
                deactivated = report.deactivated,
                dropped = report.dropped,
                "Broadcast finished"
            );
            dispatcher.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Broadcasts currently running in the background.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

enum RecipientOutcome {
    Delivered,
    Deactivated,
    Dropped,
}

/// Deliver to one recipient, with a single retry on a rate-limit signal.
async fn deliver_one<W, L, M>(
    messenger: Arc<M>,
    workers: Arc<W>,
    listings: Arc<L>,
    listing_id: i64,
    worker_id: i64,
    text: Arc<str>,
) -> RecipientOutcome
where
    W: WorkerStore,
    L: ListingStore,
    M: Messenger,
{
    let mut result = messenger.send_text(worker_id, &text).await;

    if let DeliveryResult::RateLimited(wait) = result {
        tracing::warn!(worker_id, wait_secs = wait.as_secs(), "Rate limited, retrying once");
        sleep(wait).await;
        result = messenger.send_text(worker_id, &text).await;
    }

    match result {
        DeliveryResult::Delivered => {
            // Best effort; a failed counter update never rolls back delivery.
            if let Err(err) = listings.increment_listing_views(listing_id, 1).await {
                tracing::warn!(listing_id, "Failed to bump view counter: {err}");
            }
            RecipientOutcome::Delivered
        }
        DeliveryResult::RecipientUnreachable => {
            tracing::info!(worker_id, "Recipient unreachable, deactivating");
            if let Err(err) = workers.set_worker_active(worker_id, false).await {
                tracing::error!(worker_id, "Failed to deactivate worker: {err}");
            }
            RecipientOutcome::Deactivated
        }
        DeliveryResult::RateLimited(_) => {
            tracing::warn!(worker_id, "Still rate limited after retry, dropping");
            RecipientOutcome::Dropped
        }
        DeliveryResult::TransportError(err) => {
            tracing::warn!(worker_id, error = %err, "Transport error, dropping recipient");
            RecipientOutcome::Dropped
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
