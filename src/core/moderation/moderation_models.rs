// Moderation domain models - data structures for the text moderation pipeline.
//
// These are pure domain types with no Telegram dependencies.
// The adapter layer decides what to do with a blocked verdict.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Which curated word list a blocked term belongs to.
///
/// Each submission surface draws from its own list (plus the shared
/// profanity/short-form lists), so a term can be banned in chat but fine in a
/// listing title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermCategory {
    /// General profanity, checked on every surface.
    Profanity,
    /// Long blocked phrases, matched fuzzily (edit-distance tolerant).
    LongForm,
    /// Short blocked fragments, exact containment only - too short to fuzz.
    ShortForm,
    /// Terms banned in personal-profile fields.
    Personal,
    /// Terms banned in listing text and photo captions / OCR output.
    Photo,
    /// Terms banned only in free-form chat messages.
    MessageOnly,
}

impl TermCategory {
    pub const ALL: [TermCategory; 6] = [
        TermCategory::Profanity,
        TermCategory::LongForm,
        TermCategory::ShortForm,
        TermCategory::Personal,
        TermCategory::Photo,
        TermCategory::MessageOnly,
    ];

    /// Stable name used as the storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            TermCategory::Profanity => "profanity",
            TermCategory::LongForm => "long_form",
            TermCategory::ShortForm => "short_form",
            TermCategory::Personal => "personal",
            TermCategory::Photo => "photo",
            TermCategory::MessageOnly => "message_only",
        }
    }

}

/// A term from one of the curated block lists.
///
/// Immutable per snapshot - lists are reloaded wholesale, never edited in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTerm {
    pub text: String,
    pub category: TermCategory,
}

/// An allow-list exception. A fuzzy hit whose matched fragment equals an
/// allowed term is suppressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedTerm {
    pub text: String,
}

/// Where the text being moderated came from. Passed by value, never as a
/// loosely-typed session bag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModerationContext {
    /// Free-form chat message between matched parties. The strictest surface:
    /// the full contact-leak battery runs here.
    pub is_message: bool,
    /// Personal-profile field (name, about, etc).
    pub is_personal_list: bool,
}

impl ModerationContext {
    /// Listing text, photo caption or OCR output.
    #[allow(dead_code)]
    pub fn listing() -> Self {
        Self::default()
    }

    pub fn chat_message() -> Self {
        Self {
            is_message: true,
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub fn personal_field() -> Self {
        Self {
            is_personal_list: true,
            ..Self::default()
        }
    }
}

/// Result of moderating one piece of text. Produced per call, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationVerdict {
    /// Whether the text must be rejected.
    pub blocked: bool,
    /// Human-readable reason, present when blocked.
    pub reason: Option<String>,
}

impl ModerationVerdict {
    /// Create a "text is fine" verdict.
    pub fn pass() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    /// Create a blocked verdict with a reason.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}
