// Text normalizer - canonicalizes user text before lexicon matching.
//
// Users disguise banned words with look-alike Latin letters, digits and
// symbols ("пр0д@м", "cyка"). Every lexicon check runs on the canonical form
// so the substitution table lives in exactly one place.

/// Look-alike characters folded to their canonical Cyrillic equivalent.
/// Applied after lower-casing, so only lower-case keys are listed.
const SUBSTITUTIONS: &[(char, char)] = &[
    // Latin letters that render like Cyrillic ones
    ('a', 'а'),
    ('b', 'в'),
    ('c', 'с'),
    ('e', 'е'),
    ('h', 'н'),
    ('k', 'к'),
    ('m', 'м'),
    ('o', 'о'),
    ('p', 'р'),
    ('r', 'г'),
    ('t', 'т'),
    ('u', 'и'),
    ('x', 'х'),
    ('y', 'у'),
    // Leetspeak digits and symbols
    ('0', 'о'),
    ('3', 'з'),
    ('4', 'ч'),
    ('6', 'б'),
    ('@', 'а'),
    ('$', 'с'),
    // Yo folds to e so "ё"/"е" spellings match the same terms
    ('ё', 'е'),
];

/// Canonicalize text for lexicon matching.
///
/// Lower-cases, folds look-alike Latin/leet characters to Cyrillic and maps
/// `ё` to `е`. Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            SUBSTITUTIONS
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_folds_homoglyphs() {
        assert_eq!(normalize("ПрИвЕт"), "привет");
        // Latin look-alikes become Cyrillic
        assert_eq!(normalize("cyka"), "сука");
        // Leet digits
        assert_eq!(normalize("пр0д@м"), "продам");
        assert_eq!(normalize("3айка"), "зайка");
    }

    #[test]
    fn folds_yo_to_e() {
        assert_eq!(normalize("ёлка"), "елка");
        assert_eq!(normalize("Ёж"), "еж");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(normalize("привет мир"), "привет мир");
        // digits 3/4 fold too - the contact detector works on raw text instead
        assert_eq!(normalize("123-45"), "12з-ч5");
    }

    #[test]
    fn is_idempotent() {
        for input in ["ПрИвЕт", "cyka Bly@t", "Ёлки 3елёные", "пр0д@м iphone 11"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
