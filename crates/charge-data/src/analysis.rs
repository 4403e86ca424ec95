//! Main analysis pipeline for chargelog.
//!
//! Takes a parsed export document and returns sessions, aggregate statistics
//! and charging places in one [`AnalysisResult`].

use std::time::Instant;

use chrono::Utc;
use charge_core::config::AnalysisConfig;
use charge_core::error::Result;
use charge_core::models::Session;
use charge_core::time_utils::DateRange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregator::{compute_stats, sessions_in_range, AggregateStats};
use crate::clustering::{cluster_places, Place};
use crate::normalizer::{NormalizeReport, SessionNormalizer};
use crate::providers::ProviderRegistry;
use crate::reader::records;

// ── Public types ──────────────────────────────────────────────────────────────

/// Inputs of one analysis run besides the document itself.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub config: AnalysisConfig,
    /// Inclusive window over session start times.
    pub date_range: Option<DateRange>,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Elements in the input array.
    pub records_total: usize,
    /// Elements that did not yield a session.
    pub records_dropped: usize,
    /// Sessions inside the date range.
    pub sessions_analyzed: usize,
    /// Sessions (before range filtering) with imputed delivered energy.
    pub estimated_sessions: usize,
    pub date_range: Option<DateRange>,
    /// Wall-clock seconds spent normalizing.
    pub normalize_time_seconds: f64,
    /// Wall-clock seconds spent on statistics and clustering.
    pub stats_time_seconds: f64,
}

impl AnalysisMetadata {
    pub fn new(
        report: &NormalizeReport,
        sessions_analyzed: usize,
        date_range: Option<DateRange>,
        normalize_time_seconds: f64,
        stats_time_seconds: f64,
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            records_total: report.records_total,
            records_dropped: report.records_dropped,
            sessions_analyzed,
            estimated_sessions: report.estimated_sessions,
            date_range,
            normalize_time_seconds,
            stats_time_seconds,
        }
    }
}

/// The complete output of [`analyze_document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Sessions inside the date range, in input order.
    pub sessions: Vec<Session>,
    pub stats: AggregateStats,
    pub places: Vec<Place>,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Normalize every record of `document` with a fresh provider registry.
///
/// Fails only when the top-level value is not an array.
pub fn normalize_document(document: &Value, config: &AnalysisConfig) -> Result<NormalizeReport> {
    let items = records(document)?;
    let mut registry = ProviderRegistry::new(config.provider_match_threshold);
    let report = SessionNormalizer::new(config).normalize(items, &mut registry);
    debug!(
        "{} distinct providers after reconciliation: {:?}",
        registry.len(),
        registry.canonical_names().collect::<Vec<_>>()
    );
    Ok(report)
}

/// Run the full analysis pipeline.
///
/// 1. Reject a non-array document.
/// 2. Normalize all records (fresh provider registry).
/// 3. Restrict to the date range.
/// 4. Compute statistics and cluster places.
pub fn analyze_document(document: &Value, options: &AnalysisOptions) -> Result<AnalysisResult> {
    let config = &options.config;
    let range = options.date_range.as_ref();

    // ── Step 1-2: Normalize ───────────────────────────────────────────────────
    let normalize_start = Instant::now();
    let report = normalize_document(document, config)?;
    let normalize_time = normalize_start.elapsed().as_secs_f64();

    // ── Step 3-4: Aggregate ───────────────────────────────────────────────────
    let stats_start = Instant::now();
    let stats = compute_stats(&report.sessions, range, config);
    let places = cluster_places(records(document)?, range, config);
    let stats_time = stats_start.elapsed().as_secs_f64();

    let sessions = sessions_in_range(&report.sessions, range).into_owned();
    warn_if_estimated(&stats);

    let metadata = AnalysisMetadata::new(
        &report,
        sessions.len(),
        options.date_range,
        normalize_time,
        stats_time,
    );

    Ok(AnalysisResult {
        sessions,
        stats,
        places,
        metadata,
    })
}

/// Log once per run when delivered energy had to be imputed.
pub fn warn_if_estimated(stats: &AggregateStats) {
    if stats.energy.uses_estimated_energy {
        warn!(
            "{} of {} sessions have no measured battery energy; delivered energy is estimated",
            stats.energy.estimated_sessions, stats.sessions.total_sessions
        );
    }
}
