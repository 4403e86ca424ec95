//! Weighted fuzzy scoring of short names.
//!
//! [`weighted_ratio`] scores two strings on a 0–100 scale as the best of a
//! plain ratio, token-sort and token-set comparisons, and, when the lengths
//! differ a lot, best-window partial comparisons. Token and partial scores
//! are discounted so that an exact match always outranks them.

use std::collections::BTreeSet;

/// Discount applied to token-based scores.
const TOKEN_SCALE: f64 = 0.95;
/// Discount applied to partial scores when one string is 1.5–8× longer.
const PARTIAL_SCALE: f64 = 0.90;
/// Discount applied to partial scores when one string is over 8× longer.
const FAR_PARTIAL_SCALE: f64 = 0.60;

// ── Preprocessing ─────────────────────────────────────────────────────────────

/// Lowercase, turn every non-word character into a space and trim.
pub fn full_process(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    replaced.trim().to_lowercase()
}

// ── Scorers ───────────────────────────────────────────────────────────────────

/// `2·LCS / (|a| + |b|)` as a rounded percentage.
///
/// Equal strings score 100 (even when empty); otherwise an empty side
/// scores 0.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    char_ratio(&a, &b).round()
}

/// Best [`ratio`] of the shorter string against every equally long window
/// of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a == b {
        return 100.0;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.is_empty() {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for window in long.windows(short.len()) {
        let score = char_ratio(short, window);
        if score > 99.5 {
            return 100.0;
        }
        best = best.max(score);
    }
    best.round()
}

/// Ratio of the alphabetically sorted tokens.
pub fn token_sort_ratio(a: &str, b: &str, partial: bool) -> f64 {
    let a = sorted_tokens(a.split_whitespace());
    let b = sorted_tokens(b.split_whitespace());
    score(&a, &b, partial)
}

/// Compares the shared tokens against each side's shared-plus-remaining
/// tokens, so a name and the same name with extra words score high.
pub fn token_set_ratio(a: &str, b: &str, partial: bool) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();

    let shared = sorted_tokens(ta.intersection(&tb).copied());
    let only_a = sorted_tokens(ta.difference(&tb).copied());
    let only_b = sorted_tokens(tb.difference(&ta).copied());
    let with_a = format!("{shared} {only_a}").trim().to_string();
    let with_b = format!("{shared} {only_b}").trim().to_string();

    score(&shared, &with_a, partial)
        .max(score(&shared, &with_b, partial))
        .max(score(&with_a, &with_b, partial))
}

/// Best of the plain, token and partial scores, after [`full_process`].
///
/// Returns 0 when either side has no word characters.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let p1 = full_process(a);
    let p2 = full_process(b);
    if p1.is_empty() || p2.is_empty() {
        return 0.0;
    }

    let base = ratio(&p1, &p2);
    let (l1, l2) = (p1.chars().count() as f64, p2.chars().count() as f64);
    let length_ratio = l1.max(l2) / l1.min(l2);

    if length_ratio < 1.5 {
        let sort = token_sort_ratio(&p1, &p2, false) * TOKEN_SCALE;
        let set = token_set_ratio(&p1, &p2, false) * TOKEN_SCALE;
        return base.max(sort).max(set).round();
    }

    let scale = if length_ratio > 8.0 {
        FAR_PARTIAL_SCALE
    } else {
        PARTIAL_SCALE
    };
    let partial = partial_ratio(&p1, &p2) * scale;
    let sort = token_sort_ratio(&p1, &p2, true) * TOKEN_SCALE * scale;
    let set = token_set_ratio(&p1, &p2, true) * TOKEN_SCALE * scale;
    base.max(partial).max(sort).max(set).round()
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn score(a: &str, b: &str, partial: bool) -> f64 {
    if partial {
        partial_ratio(a, b)
    } else {
        ratio(a, b)
    }
}

fn sorted_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    let mut tokens: Vec<&str> = tokens.collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn char_ratio(a: &[char], b: &[char]) -> f64 {
    if a == b {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    200.0 * lcs_len(a, b) as f64 / (a.len() + b.len()) as f64
}

/// Longest common subsequence length, single-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if ca == cb { diag + 1 } else { up.max(row[j]) };
            diag = up;
        }
    }
    row[b.len()]
}
