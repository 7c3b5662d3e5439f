// Contact-leak detector - catches attempts to move the deal off-platform.
//
// A fixed battery of independent pattern checks over the RAW text (the
// normalizer folds digits into letters, so it must not run first here). Each
// check short-circuits with its own reason; order only affects which reason
// the caller sees, not the boolean outcome.
//
// Two surfaces share the battery:
// - free-form chat runs every check, including the aggressive digit-density
//   and Latin-run heuristics;
// - listing text runs the narrower subset (clean/obfuscated phones, emails,
//   links) so prices and dimensions survive moderation.

use super::moderation_models::ModerationVerdict;
use once_cell::sync::Lazy;
use regex::Regex;

// --- phone shapes (check 1) ---

static PHONE_334: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{3}[\s.\-]?\d{3}[\s.\-]?\d{4}").unwrap());

static DIGIT_RUN_10_15: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{10,15}").unwrap());

/// Grouped 11-digit Russian mobile: 8 (999) 123-45-67 and friends.
static RU_MOBILE_GROUPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[78][\s.\-(]{0,3}\d{3}[\s.\-)]{0,3}\d{3}[\s.\-]{0,3}\d{2}[\s.\-]{0,3}\d{2}")
        .unwrap()
});

// --- digit density (check 4, chat only) ---

static DIGIT_RUN_5: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5,}").unwrap());

// --- email shapes (check 5) ---

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").unwrap());

/// "vasya собака mail точка ru" - the spelled-out variant.
static SPELLED_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[a-zа-яё0-9._\-]+\s*(?:\(\s*собака\s*\)|собака|\bat\b)\s*[a-zа-яё0-9\-]+\s*(?:\(\s*точка\s*\)|точка|\bdot\b)\s*[a-zа-яё]{2,}",
    )
    .unwrap()
});

// --- URL / domain shapes (check 6) ---

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").unwrap());

/// Bare token.tld against a curated TLD list.
static BARE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b[a-zа-яё0-9\-]+\.(?:ru|su|com|net|org|info|biz|online|site|store|shop|pro|me|io|cc|tv|ua|by|kz|рф)\b",
    )
    .unwrap()
});

// --- messenger handles and brands (check 7, chat only) ---

static HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[A-Za-z0-9_]{3,}").unwrap());

static MESSENGER_BRAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:telegram|телеграмм?|телега|whatsapp|вотсап|ватсап|вацап|viber|вайбер|instagram|инстаграм|инста|skype|скайп|discord|дискорд|вконтакте|авито|avito|юла)\b",
    )
    .unwrap()
});

// --- Latin runs (check 8, chat only) ---

static LATIN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{3,}").unwrap());

/// Delimiters users stuff between digits to break up a phone number.
const DIGIT_DELIMITERS: &[char] = &[
    ' ', '.', '-', '/', '\\', '(', ')', '+', ',', ';', ':', '*', '_', '=',
];

/// Russian number-words, used to spell a phone digit by digit.
const NUMBER_WORDS: &[(&str, char)] = &[
    ("ноль", '0'),
    ("один", '1'),
    ("два", '2'),
    ("три", '3'),
    ("четыре", '4'),
    ("пять", '5'),
    ("шесть", '6'),
    ("семь", '7'),
    ("восемь", '8'),
    ("девять", '9'),
];

/// Run the full battery (chat surface).
pub fn detect_in_chat(text: &str) -> ModerationVerdict {
    if has_phone_shape(text) {
        return ModerationVerdict::blocked("phone number detected");
    }
    if has_obfuscated_digit_group(text) {
        return ModerationVerdict::blocked("obfuscated phone number detected");
    }
    if has_spelled_out_number(text) {
        return ModerationVerdict::blocked("spelled-out phone number detected");
    }
    if DIGIT_RUN_5.is_match(text) {
        return ModerationVerdict::blocked("digit run detected");
    }
    if has_email_shape(text) {
        return ModerationVerdict::blocked("email address detected");
    }
    if has_link_shape(text) {
        return ModerationVerdict::blocked("link detected");
    }
    if HANDLE.is_match(text) || MESSENGER_BRAND.is_match(text) {
        return ModerationVerdict::blocked("messenger handle detected");
    }
    if LATIN_RUN.is_match(text) {
        return ModerationVerdict::blocked("latin script is not allowed here");
    }
    ModerationVerdict::pass()
}

/// Run the listing subset: clean and obfuscated phone shapes, emails, links.
pub fn detect_in_listing(text: &str) -> ModerationVerdict {
    if has_phone_shape(text) {
        return ModerationVerdict::blocked("phone number detected");
    }
    if has_obfuscated_digit_group(text) {
        return ModerationVerdict::blocked("obfuscated phone number detected");
    }
    if has_email_shape(text) {
        return ModerationVerdict::blocked("email address detected");
    }
    if has_link_shape(text) {
        return ModerationVerdict::blocked("link detected");
    }
    ModerationVerdict::pass()
}

fn has_phone_shape(text: &str) -> bool {
    PHONE_334.is_match(text) || DIGIT_RUN_10_15.is_match(text) || RU_MOBILE_GROUPED.is_match(text)
}

fn has_email_shape(text: &str) -> bool {
    EMAIL.is_match(text) || SPELLED_EMAIL.is_match(text)
}

fn has_link_shape(text: &str) -> bool {
    URL.is_match(text) || BARE_DOMAIN.is_match(text)
}

/// Check 2: digits split by delimiters into at least two groups whose
/// concatenation is a dialable number ("8 999 123 45 67", "8.9.9.9...").
/// Re-validating the decoded digits keeps dimension and price lists like
/// "2400, 1200, 600" out.
fn has_obfuscated_digit_group(text: &str) -> bool {
    let mut run = String::new();
    let mut groups = 0usize;
    let mut in_digit_group = false;
    let mut in_run = false;

    let check = |run: &str, groups: usize| groups >= 2 && is_valid_phone_digits(run);

    for c in text.chars() {
        if c.is_ascii_digit() {
            run.push(c);
            if !in_digit_group {
                groups += 1;
                in_digit_group = true;
            }
            in_run = true;
        } else if in_run && DIGIT_DELIMITERS.contains(&c) {
            in_digit_group = false;
        } else {
            if check(&run, groups) {
                return true;
            }
            run.clear();
            groups = 0;
            in_digit_group = false;
            in_run = false;
        }
    }
    check(&run, groups)
}

/// Check 3: >= 10 consecutive number-words that decode to a valid phone.
fn has_spelled_out_number(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let mut run = String::new();

    for token in lowered.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        match NUMBER_WORDS.iter().find(|(w, _)| *w == token) {
            Some((_, digit)) => run.push(*digit),
            None => {
                if is_valid_phone_digits(&run) {
                    return true;
                }
                run.clear();
            }
        }
    }
    is_valid_phone_digits(&run)
}

/// 10-11 digits with a valid leading digit (8/7 for 11, bare 9xx for 10).
fn is_valid_phone_digits(digits: &str) -> bool {
    match digits.len() {
        11 => digits.starts_with('7') || digits.starts_with('8'),
        10 => digits.starts_with('9'),
        _ => false,
    }
}
