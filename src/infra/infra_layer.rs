// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "db.rs"]
pub mod db;

#[path = "moderation/sqlite_lexicon_store.rs"]
pub mod moderation;

#[path = "bans/sqlite_ban_store.rs"]
pub mod bans;

#[path = "marketplace/sqlite_market_store.rs"]
pub mod marketplace;

#[path = "messaging/telegram_client.rs"]
pub mod messaging;
