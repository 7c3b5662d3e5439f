// This is the entry point of the listing bot core.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, messaging API)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the background loops: chat policing, listing dispatch, lexicon reload

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::bans::{BanEscalationService, BanStore};
use crate::core::dispatch::{
    BroadcastDispatcher, DispatchConfig, EligibilityMatcher, Listing, ListingStore,
};
use crate::core::moderation::{LexiconSource, LexiconStore, ModerationContext, ModerationGate};
use crate::infra::bans::SqliteBanStore;
use crate::infra::marketplace::SqliteMarketStore;
use crate::infra::messaging::TelegramClient;
use crate::infra::moderation::SqliteLexiconStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// How many freshly accepted listings one dispatch poll picks up.
const DISPATCH_CLAIM_LIMIT: usize = 16;

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// The broadcast payload. The full listing card (description, photos,
/// customer menus) is rendered by the UI layer outside this crate.
fn render_listing_text(listing: &Listing) -> String {
    format!(
        "New listing #{} in your city (category {}). Open the bot to respond.",
        listing.id, listing.category_id
    )
}

/// Police one incoming chat message: banned users are ignored outright,
/// blocked content registers an offense and tells the sender why.
async fn handle_chat_message<S, B>(
    gate: &ModerationGate<S>,
    bans: &BanEscalationService<B>,
    telegram: &TelegramClient,
    chat_id: i64,
    from_id: i64,
    text: &str,
) where
    S: LexiconSource,
    B: BanStore,
{
    match bans.is_blocked(from_id).await {
        Ok(true) => return,
        Ok(false) => {}
        Err(err) => {
            tracing::error!(from_id, "Ban lookup failed: {err}");
            return;
        }
    }

    let verdict = gate.evaluate(text, ModerationContext::chat_message());
    if !verdict.blocked {
        return;
    }

    let reason = verdict.reason.unwrap_or_else(|| "blocked".to_string());
    if let Err(err) = bans.offense(from_id, &reason).await {
        tracing::error!(from_id, "Failed to register offense: {err}");
    }

    // The gate already picked a user-safe reason: specific for lexicon hits,
    // generic for contact leaks.
    use crate::core::dispatch::Messenger;
    let delivery = telegram
        .send_text(chat_id, &format!("Message blocked: {reason}"))
        .await;
    tracing::info!(chat_id, from_id, ?delivery, "Chat message blocked");
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("BOT_TOKEN")
        .expect("Missing BOT_TOKEN environment variable! Create a .env file with your bot token.");

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/listing_bot.db".to_string());
    let pool = infra::db::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    let lexicon_source = SqliteLexiconStore::new(pool.clone());
    lexicon_source
        .migrate()
        .await
        .expect("Failed to migrate lexicon tables");
    let lexicon = Arc::new(LexiconStore::new(lexicon_source));
    if let Err(err) = lexicon.reload().await {
        // Moderation degrades to "no matches" until the next reload succeeds
        tracing::warn!("Initial lexicon load failed: {err}");
    }
    let gate = Arc::new(ModerationGate::new(Arc::clone(&lexicon)));

    let ban_store = SqliteBanStore::new(pool.clone());
    ban_store
        .migrate()
        .await
        .expect("Failed to migrate ban tables");
    let bans = Arc::new(BanEscalationService::new(ban_store));

    let market = Arc::new(SqliteMarketStore::new(pool.clone()));
    market
        .migrate()
        .await
        .expect("Failed to migrate marketplace tables");

    let telegram = Arc::new(TelegramClient::new(&token).expect("Failed to create Telegram client"));

    let matcher = Arc::new(EligibilityMatcher::new(Arc::clone(&market)));
    let dispatch_config = DispatchConfig {
        batch_size: env_u64("DISPATCH_BATCH_SIZE", 5) as usize,
        inter_batch_delay: Duration::from_millis(env_u64("DISPATCH_BATCH_DELAY_MS", 500)),
    };
    let dispatcher = Arc::new(BroadcastDispatcher::new(
        Arc::clone(&market),
        Arc::clone(&market),
        Arc::clone(&telegram),
        dispatch_config,
    ));

    // ========================================================================
    // BACKGROUND LOOPS
    // ========================================================================

    // Periodic lexicon reload so admin edits to the word lists go live
    // without a restart. A failed reload keeps the previous snapshot.
    let reload_secs = env_u64("LEXICON_RELOAD_SECS", 600);
    {
        let lexicon = Arc::clone(&lexicon);
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(reload_secs)).await;
                match lexicon.reload().await {
                    Ok(()) => tracing::debug!("Lexicon reloaded"),
                    Err(err) => tracing::warn!("Lexicon reload failed: {err}"),
                }
            }
        });
    }

    // Listing dispatch poller: claim accepted listings and broadcast each to
    // its eligible workers, fire-and-forget.
    let poll_secs = env_u64("DISPATCH_POLL_SECS", 5);
    {
        let market = Arc::clone(&market);
        let matcher = Arc::clone(&matcher);
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            loop {
                match market.claim_undispatched(DISPATCH_CLAIM_LIMIT).await {
                    Ok(listing_ids) => {
                        for listing_id in listing_ids {
                            let listing = match market.get_listing(listing_id).await {
                                Ok(Some(listing)) => listing,
                                Ok(None) => {
                                    tracing::warn!(listing_id, "Claimed listing vanished");
                                    continue;
                                }
                                Err(err) => {
                                    tracing::error!(listing_id, "Failed to load listing: {err}");
                                    continue;
                                }
                            };

                            match matcher
                                .eligible_workers(listing.city_id, listing.category_id)
                                .await
                            {
                                Ok(workers) if workers.is_empty() => {
                                    tracing::info!(listing_id, "No eligible workers");
                                }
                                Ok(workers) => {
                                    tracing::info!(
                                        listing_id,
                                        recipients = workers.len(),
                                        "Broadcasting listing"
                                    );
                                    let text = render_listing_text(&listing);
                                    dispatcher.spawn_dispatch(listing, text, workers);
                                }
                                Err(err) => {
                                    tracing::error!(
                                        listing_id,
                                        "Eligibility lookup failed: {err}"
                                    );
                                }
                            }
                        }
                    }
                    Err(err) => tracing::error!("Dispatch poll failed: {err}"),
                }

                tracing::debug!(in_flight = dispatcher.in_flight(), "Dispatch poll complete");
                sleep(Duration::from_secs(poll_secs)).await;
            }
        });
    }

    tracing::info!("Listing bot core is running");

    // Chat policing loop: long-poll incoming messages and moderate free-form
    // chat. Menu commands and profile editing are handled by the UI layer.
    let mut offset = 0i64;
    loop {
        let updates = match telegram.get_updates(offset, 25).await {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!("getUpdates failed: {err}");
                sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let (Some(from), Some(text)) = (message.from, message.text) else {
                continue;
            };
            handle_chat_message(&gate, &bans, &telegram, message.chat.id, from.id, &text).await;
        }
    }
}
