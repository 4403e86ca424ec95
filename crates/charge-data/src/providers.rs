//! Fuzzy reconciliation of charging-provider names.
//!
//! Exports spell the same operator in many ways ("IONITY HPC GmbH",
//! "Ionity"). [`ProviderRegistry`] remembers every name seen during one
//! analysis run and folds later variants onto the first spelling encountered.

use std::sync::OnceLock;

use charge_core::config::DEFAULT_PROVIDER_MATCH_THRESHOLD;
use regex::Regex;
use tracing::debug;

use crate::fuzzy::weighted_ratio;

// ── Name cleanup ──────────────────────────────────────────────────────────────

fn noise_tokens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(HPC|DC|AC|GmbH)\b").expect("regex is valid"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("regex is valid"))
}

/// Comparison key for a provider name.
///
/// Drops the standalone tokens `HPC`, `DC`, `AC` and `GmbH` (any case),
/// collapses whitespace and lowercases.
pub fn clean_provider_name(name: &str) -> String {
    let stripped = noise_tokens().replace_all(name, "");
    whitespace_runs()
        .replace_all(&stripped, " ")
        .trim()
        .to_lowercase()
}

// ── ProviderRegistry ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct KnownProvider {
    cleaned: String,
    display_name: String,
}

/// Names seen so far in one analysis run.
///
/// Order-dependent: the first spelling of a provider becomes its canonical
/// name. Build a fresh registry (or call [`ProviderRegistry::reset`]) for
/// every document.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    threshold: f64,
    known: Vec<KnownProvider>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_MATCH_THRESHOLD)
    }
}

impl ProviderRegistry {
    /// `threshold` is the score (0–100) a match must strictly exceed.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            known: Vec::new(),
        }
    }

    /// Map `raw_name` to its canonical spelling, registering it if new.
    pub fn reconcile(&mut self, raw_name: &str) -> String {
        let cleaned = clean_provider_name(raw_name);

        // Highest score wins; on equal scores the earlier registration stays.
        let mut best: Option<(&KnownProvider, f64)> = None;
        for known in &self.known {
            let score = weighted_ratio(&cleaned, &known.cleaned);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((known, score));
            }
        }

        if let Some((known, score)) = best {
            if score > self.threshold {
                debug!(
                    "ProviderRegistry: matched \"{}\" to \"{}\" (score {:.1})",
                    raw_name, known.display_name, score
                );
                return known.display_name.clone();
            }
        }

        debug!("ProviderRegistry: new provider \"{}\"", raw_name);
        self.known.push(KnownProvider {
            cleaned,
            display_name: raw_name.to_string(),
        });
        raw_name.to_string()
    }

    /// Forget every registered name.
    pub fn reset(&mut self) {
        self.known.clear();
    }

    /// Number of distinct canonical providers.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Canonical names in registration order.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(|k| k.display_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── clean_provider_name ───────────────────────────────────────────────────

    #[test]
    fn test_clean_strips_noise_tokens() {
        assert_eq!(clean_provider_name("IONITY HPC GmbH"), "ionity");
        assert_eq!(clean_provider_name("EnBW mobility+ AC"), "enbw mobility+");
        assert_eq!(clean_provider_name("  Allego   dc  "), "allego");
    }

    #[test]
    fn test_clean_keeps_tokens_inside_words() {
        // "ACME" and "DCS" are not standalone tokens.
        assert_eq!(clean_provider_name("ACME Charging"), "acme charging");
        assert_eq!(clean_provider_name("DCS Fast"), "dcs fast");
    }

    // ── ProviderRegistry ──────────────────────────────────────────────────────

    #[test]
    fn test_reconcile_first_spelling_wins() {
        let mut registry = ProviderRegistry::default();
        assert_eq!(registry.reconcile("IONITY HPC GmbH"), "IONITY HPC GmbH");
        assert_eq!(registry.reconcile("Ionity"), "IONITY HPC GmbH");
        assert_eq!(registry.reconcile("EnBW mobility+ AC"), "EnBW mobility+ AC");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reconcile_is_order_dependent() {
        let mut registry = ProviderRegistry::default();
        assert_eq!(registry.reconcile("Ionity"), "Ionity");
        assert_eq!(registry.reconcile("IONITY HPC GmbH"), "Ionity");
    }

    #[test]
    fn test_reconcile_below_threshold_registers_new() {
        let mut registry = ProviderRegistry::default();
        registry.reconcile("Tesla Supercharger");
        assert_eq!(registry.reconcile("Fastned"), "Fastned");
        assert_eq!(
            registry.canonical_names().collect::<Vec<_>>(),
            vec!["Tesla Supercharger", "Fastned"]
        );
    }

    #[test]
    fn test_reconcile_merges_suffix_variants() {
        let mut registry = ProviderRegistry::default();
        assert_eq!(registry.reconcile("Pfalzwerke AG"), "Pfalzwerke AG");
        assert_eq!(registry.reconcile("Pfalzwerke"), "Pfalzwerke AG");
        assert_eq!(registry.reconcile("Shell Recharge NL"), "Shell Recharge NL");
        assert_eq!(registry.reconcile("Shell Recharge"), "Shell Recharge NL");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reconcile_short_name_inside_long_one_stays_separate() {
        // Partial matches are capped at 90, which does not exceed the threshold.
        let mut registry = ProviderRegistry::default();
        registry.reconcile("EnBW mobility+");
        assert_eq!(registry.reconcile("EnBW"), "EnBW");
    }

    #[test]
    fn test_reconcile_threshold_is_strict() {
        // "aral pulse" vs "aral pulsx" share 9 of 10 characters: exactly 90.
        let mut registry = ProviderRegistry::new(90.0);
        registry.reconcile("Aral pulse");
        assert_eq!(registry.reconcile("Aral pulsx"), "Aral pulsx");

        let mut lenient = ProviderRegistry::new(89.0);
        lenient.reconcile("Aral pulse");
        assert_eq!(lenient.reconcile("Aral pulsx"), "Aral pulse");
    }

    #[test]
    fn test_reset_forgets_names() {
        let mut registry = ProviderRegistry::default();
        registry.reconcile("IONITY");
        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.reconcile("Ionity"), "Ionity");
    }
}
