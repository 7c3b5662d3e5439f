// Core bans module - offense counting and ban escalation.
// Following the same pattern as the moderation module.

pub mod ban_models;
pub mod ban_service;

pub use ban_models::*;
pub use ban_service::*;
