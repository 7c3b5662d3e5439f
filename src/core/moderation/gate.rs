// Moderation gate - the single verdict every submission path consults.
//
// Combines the exact-containment lists, the fuzzy long-form matcher and the
// contact-leak detector. Cheap exact checks run before the expensive fuzzy
// scan; the leak battery runs last.

use super::contact_leak;
use super::fuzzy;
use super::lexicon::{LexiconSource, LexiconStore};
use super::moderation_models::{ModerationContext, ModerationVerdict, TermCategory};
use super::normalizer::normalize;
use std::sync::Arc;

/// What a chat user sees instead of the exact leak pattern we matched.
/// Kept deliberately vague so repeat offenders cannot tune around the
/// detector.
pub const CONTACT_REDIRECT_MESSAGE: &str =
    "Sharing contact details in chat is not allowed. Use the contact-request feature instead.";

pub struct ModerationGate<S: LexiconSource> {
    lexicon: Arc<LexiconStore<S>>,
}

impl<S: LexiconSource> ModerationGate<S> {
    pub fn new(lexicon: Arc<LexiconStore<S>>) -> Self {
        Self { lexicon }
    }

    /// Which exact-containment lists apply to a surface. Profanity and the
    /// short fragments are universal; each surface adds its own curated list.
    /// Long-form terms are not here - they always go through the fuzzy scan.
    fn exact_categories(context: ModerationContext) -> [TermCategory; 3] {
        let surface = if context.is_message {
            TermCategory::MessageOnly
        } else if context.is_personal_list {
            TermCategory::Personal
        } else {
            TermCategory::Photo
        };
        [TermCategory::Profanity, TermCategory::ShortForm, surface]
    }

    /// Moderate one piece of text. OCR output goes through here unchanged.
    ///
    /// Never fails outward: an empty or unloaded lexicon simply finds no
    /// matches.
    pub fn evaluate(&self, text: &str, context: ModerationContext) -> ModerationVerdict {
        let snapshot = self.lexicon.snapshot();
        let normalized = normalize(text);

        // Exact containment first - cheap.
        for category in Self::exact_categories(context) {
            for term in snapshot.terms(category) {
                if normalized.contains(term.as_str()) {
                    return ModerationVerdict::blocked(format!("matched: {term}"));
                }
            }
        }

        // Fuzzy long-form scan with allow-list override.
        for term in snapshot.terms(TermCategory::LongForm) {
            if fuzzy::fuzzy_match(&normalized, term, |fragment| snapshot.is_allowed(fragment)) {
                return ModerationVerdict::blocked(format!("matched: {term}"));
            }
        }

        // Contact-leak battery. Chat gets the full battery but a generic
        // reason; listings get the narrower subset with the specific reason
        // so honest users can fix their text.
        if context.is_message {
            if contact_leak::detect_in_chat(text).blocked {
                return ModerationVerdict::blocked(CONTACT_REDIRECT_MESSAGE);
            }
        } else if !context.is_personal_list {
            let verdict = contact_leak::detect_in_listing(text);
            if verdict.blocked {
                return verdict;
            }
        }

        ModerationVerdict::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::lexicon::LexiconSource;
    use crate::core::moderation::moderation_models::{AllowedTerm, BlockedTerm, ModerationError};
    use async_trait::async_trait;

    struct StaticSource {
        blocked: Vec<BlockedTerm>,
        allowed: Vec<AllowedTerm>,
    }

    #[async_trait]
    impl LexiconSource for StaticSource {
        async fn get_blocked_terms(
            &self,
            category: TermCategory,
        ) -> Result<Vec<BlockedTerm>, ModerationError> {
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

    fn blocked(text: &str, category: TermCategory) -> BlockedTerm {
        BlockedTerm {
            text: text.to_string(),
            category,
        }
    }

    async fn gate_with(
        blocked_terms: Vec<BlockedTerm>,
        allowed: Vec<AllowedTerm>,
    ) -> ModerationGate<StaticSource> {
        let store = Arc::new(LexiconStore::new(StaticSource {
            blocked: blocked_terms,
            allowed,
        }));
        store.reload().await.unwrap();
        ModerationGate::new(store)
    }

    #[tokio::test]
    async fn profanity_is_blocked_on_every_surface() {
        let gate = gate_with(vec![blocked("дурак", TermCategory::Profanity)], vec![]).await;

        for context in [
            ModerationContext::listing(),
            ModerationContext::chat_message(),
            ModerationContext::personal_field(),
        ] {
            let verdict = gate.evaluate("ну ты и ДуРаК", context);
            assert!(verdict.blocked);
            assert_eq!(verdict.reason.as_deref(), Some("matched: дурак"));
        }
    }

    #[tokio::test]
    async fn disguised_term_is_caught_via_normalization() {
        let gate = gate_with(vec![blocked("сука", TermCategory::Profanity)], vec![]).await;
        assert!(gate
            .evaluate("ах ты cyk@", ModerationContext::listing())
            .blocked);
    }

    #[tokio::test]
    async fn surface_lists_stay_separate() {
        let gate = gate_with(
            vec![
                blocked("оплата на месте", TermCategory::MessageOnly),
                blocked("интим", TermCategory::Photo),
            ],
            vec![],
        )
        .await;

        // MessageOnly term blocks chat but not listings
        assert!(gate
            .evaluate("оплата на месте", ModerationContext::chat_message())
            .blocked);
        assert!(!gate
            .evaluate("оплата на месте", ModerationContext::listing())
            .blocked);

        // Photo/listing term blocks listings but not personal fields
        assert!(gate.evaluate("интим", ModerationContext::listing()).blocked);
        assert!(!gate
            .evaluate("интим", ModerationContext::personal_field())
            .blocked);
    }

    #[tokio::test]
    async fn long_form_fuzzy_hit_with_allow_list_override() {
        let gate = gate_with(
            vec![blocked("запрещенка", TermCategory::LongForm)],
            vec![AllowedTerm {
                text: "запрещенко".to_string(),
            }],
        )
        .await;

        // One substitution away - blocked
        assert!(gate
            .evaluate("есть зопрещенка свежая", ModerationContext::listing())
            .blocked);
        // The allow-listed surname is not
        assert!(!gate
            .evaluate("мастер запрещенко тут", ModerationContext::listing())
            .blocked);
    }

    #[tokio::test]
    async fn chat_contact_leak_returns_generic_reason() {
        let gate = gate_with(vec![], vec![]).await;
        let verdict = gate.evaluate("звони 89991234567", ModerationContext::chat_message());
        assert!(verdict.blocked);
        assert_eq!(verdict.reason.as_deref(), Some(CONTACT_REDIRECT_MESSAGE));
    }

    #[tokio::test]
    async fn listing_contact_leak_names_the_pattern() {
        let gate = gate_with(vec![], vec![]).await;
        let verdict = gate.evaluate(
            "недорого, пишите на test@example.com",
            ModerationContext::listing(),
        );
        assert!(verdict.blocked);
        assert_eq!(verdict.reason.as_deref(), Some("email address detected"));
    }

    #[tokio::test]
    async fn clean_text_passes_with_empty_lexicon() {
        let store = Arc::new(LexiconStore::new(StaticSource {
            blocked: vec![],
            allowed: vec![],
        }));
        // No reload at all - gate must still answer
        let gate = ModerationGate::new(store);
        assert!(!gate
            .evaluate("починю кран", ModerationContext::listing())
            .blocked);
    }
}
