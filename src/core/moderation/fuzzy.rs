// Fuzzy lexicon matcher - edit-distance tolerant scan for long blocked
// phrases.
//
// A term of length N tolerates floor(N * 0.10) edits, so anything under 10
// characters is effectively exact-match. That cutoff is deliberate: short
// terms cannot absorb edits without drowning in false positives, which is
// also why the short-form/profanity lists use plain containment instead.

/// Edit distance as a fraction of term length.
const TOLERANCE_RATIO: f64 = 0.10;

/// Classic Levenshtein over char slices (inputs are short - terms and
/// term-sized windows - so the full matrix is fine).
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a.len()][b.len()]
}

/// How many edits a term of this length tolerates.
pub fn tolerance_for(term_len: usize) -> usize {
    (term_len as f64 * TOLERANCE_RATIO).floor() as usize
}

/// Slide a term-sized window across `text` and report whether any window is
/// within tolerance of `term`. A window that the allow-list claims verbatim
/// is skipped and scanning continues.
///
/// Both `text` and `term` must already be normalized.
pub fn fuzzy_match(text: &str, term: &str, is_allowed: impl Fn(&str) -> bool) -> bool {
    let text: Vec<char> = text.chars().collect();
    let term: Vec<char> = term.chars().collect();
    if term.is_empty() || text.len() < term.len() {
        return false;
    }

    let tolerance = tolerance_for(term.len());
    for window in text.windows(term.len()) {
        if levenshtein(window, &term) <= tolerance {
            let fragment: String = window.iter().collect();
            if is_allowed(&fragment) {
                continue;
            }
            return true;
        }
    }
    false
}
