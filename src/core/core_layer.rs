// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "bans/mod.rs"]
pub mod bans;

#[path = "dispatch/mod.rs"]
pub mod dispatch;
