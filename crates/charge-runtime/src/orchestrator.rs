//! Parallel evaluation of the analysis pipeline.
//!
//! Normalization runs first on the calling task. The independent metric
//! groups and the place clustering are then dispatched as blocking jobs over
//! a shared, immutable session list, at most `workers` at a time, and joined
//! before the result is assembled.

use std::sync::Arc;
use std::time::Instant;

use charge_core::config::AnalysisConfig;
use charge_core::error::{ChargeError, Result};
use charge_core::models::Session;
use charge_data::aggregator::{
    efficiency_stats, energy_totals, peak_power_trend, session_totals, sessions_in_range, soc_stats,
    AggregateStats,
};
use charge_data::analysis::{
    normalize_document, warn_if_estimated, AnalysisMetadata, AnalysisOptions, AnalysisResult,
};
use charge_data::battery::capacity_trend;
use charge_data::clustering::cluster_places;
use charge_data::reader::records;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

// ── AnalysisOrchestrator ──────────────────────────────────────────────────────

/// Bounded worker pool for analysis jobs.
///
/// The pool is shared by every [`AnalysisOrchestrator::run`] on the same
/// orchestrator; runs never share any other state.
pub struct AnalysisOrchestrator {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with `config.workers` permits (at least one).
    pub fn new(config: &AnalysisConfig) -> Self {
        let workers = config.workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Analyse `document`, computing the aggregates in parallel.
    ///
    /// Produces the same sessions, statistics and places as
    /// [`charge_data::analysis::analyze_document`].
    pub async fn run(&self, document: &Value, options: &AnalysisOptions) -> Result<AnalysisResult> {
        let config = options.config.clone();
        let range = options.date_range;

        // ── Normalize (sequential: provider reconciliation is order-dependent)
        let normalize_start = Instant::now();
        let report = normalize_document(document, &config)?;
        let normalize_time = normalize_start.elapsed().as_secs_f64();

        let selected: Arc<[Session]> = sessions_in_range(&report.sessions, range.as_ref())
            .into_owned()
            .into();
        let raw: Arc<[Value]> = records(document)?.to_vec().into();

        // ── Fan out ───────────────────────────────────────────────────────────
        let stats_start = Instant::now();
        debug!(
            "Dispatching aggregate jobs over {} sessions ({} workers)",
            selected.len(),
            self.workers
        );

        let totals = {
            let (s, top_n) = (Arc::clone(&selected), config.top_providers);
            self.spawn("session_totals", move || session_totals(&s, top_n))
        };
        let energy = {
            let (s, threshold) = (Arc::clone(&selected), config.dc_power_threshold_kw);
            self.spawn("energy_totals", move || energy_totals(&s, threshold))
        };
        let efficiency = {
            let (s, active) = (Arc::clone(&selected), range.is_some());
            self.spawn("efficiency_stats", move || efficiency_stats(&s, active))
        };
        let soc = {
            let s = Arc::clone(&selected);
            self.spawn("soc_stats", move || soc_stats(&s))
        };
        let trend = {
            let (s, min_kwh) = (Arc::clone(&selected), config.capacity_min_energy_kwh);
            self.spawn("capacity_trend", move || capacity_trend(&s, min_kwh))
        };
        let peaks = {
            let (s, min_kw) = (Arc::clone(&selected), config.peak_power_min_kw);
            self.spawn("peak_power_trend", move || peak_power_trend(&s, min_kw))
        };
        let places = {
            let (r, cfg) = (Arc::clone(&raw), config.clone());
            self.spawn("cluster_places", move || cluster_places(&r, range.as_ref(), &cfg))
        };

        // ── Join all ──────────────────────────────────────────────────────────
        let (totals, energy, efficiency, soc, trend, peaks, places) = tokio::join!(
            join("session_totals", totals),
            join("energy_totals", energy),
            join("efficiency_stats", efficiency),
            join("soc_stats", soc),
            join("capacity_trend", trend),
            join("peak_power_trend", peaks),
            join("cluster_places", places),
        );

        let stats =
            AggregateStats::from_parts(totals?, energy?, efficiency?, soc?, trend?, peaks?);
        let places = places?;
        let stats_time = stats_start.elapsed().as_secs_f64();
        warn_if_estimated(&stats);

        let sessions = selected.to_vec();
        let metadata =
            AnalysisMetadata::new(&report, sessions.len(), range, normalize_time, stats_time);

        Ok(AnalysisResult {
            sessions,
            stats,
            places,
            metadata,
        })
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Run `job` on the blocking pool once a permit is free.
    fn spawn<T, F>(&self, name: &'static str, job: F) -> JoinHandle<Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ChargeError::Task(format!("{name}: {e}")))?;
            tokio::task::spawn_blocking(job)
                .await
                .map_err(|e| ChargeError::Task(format!("{name}: {e}")))
        })
    }
}

/// Await a job, turning a panic or cancellation into [`ChargeError::Task`].
async fn join<T>(name: &'static str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle
        .await
        .map_err(|e| ChargeError::Task(format!("{name}: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use charge_core::time_utils::DateRange;
    use charge_data::analysis::analyze_document;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(start: i64, soc: (u32, u32), grid: f64, power: f64, provider: &str, lat: f64) -> Value {
        json!({
            "startTime": start,
            "endTime": start + 2400,
            "displayedStartSoc": soc.0,
            "displayedSoc": soc.1,
            "energyConsumedFromPowerGridKwh": grid,
            "chargingBlocks": [{"averagePowerGridKw": power}, {"averagePowerGridKw": power / 2.0}],
            "chargingLocation": {
                "formattedAddress": "Raststätte Fürholzen",
                "mapMatchedLatitude": lat,
                "mapMatchedLongitude": 11.60
            },
            "publicChargingPoint": {"potentialChargingPointMatches": [{"providerName": provider}]},
            "mileage": 20_000 + start / 10_000
        })
    }

    fn sample_document() -> Value {
        json!([
            record(1_704_103_200, (15, 80), 55.0, 140.0, "IONITY HPC GmbH", 48.35),
            record(1_704_362_400, (40, 40), 0.0, 0.0, "Ionity", 48.3501),
            record(1_704_621_600, (30, 100), 50.0, 11.0, "EnBW mobility+ AC", 48.40),
            record(1_706_781_600, (20, 90), 48.0, 75.0, "Allego", 48.35),
            json!({"startTime": 1_706_800_000, "displayedSoc": 50}),
        ])
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_matches_sequential() {
        let doc = sample_document();
        let options = AnalysisOptions::default();

        let sequential = analyze_document(&doc, &options).unwrap();
        let parallel = AnalysisOrchestrator::new(&options.config)
            .run(&doc, &options)
            .await
            .unwrap();

        assert_eq!(parallel.sessions, sequential.sessions);
        assert_eq!(parallel.stats, sequential.stats);
        assert_eq!(parallel.places, sequential.places);
        assert_eq!(parallel.metadata.records_dropped, 1);
        assert_eq!(parallel.stats.sessions.total_sessions, 4);
        assert_eq!(parallel.stats.peak_power_trend.len(), 1);
        assert_eq!(parallel.stats.sessions.top_failed_providers[0].provider, "IONITY HPC GmbH");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_matches_sequential_with_range() {
        let doc = sample_document();
        let options = AnalysisOptions {
            date_range: Some(
                DateRange::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
                )
                .unwrap(),
            ),
            ..AnalysisOptions::default()
        };

        let sequential = analyze_document(&doc, &options).unwrap();
        let parallel = AnalysisOrchestrator::new(&options.config)
            .run(&doc, &options)
            .await
            .unwrap();

        assert_eq!(parallel.sessions.len(), 3);
        assert_eq!(parallel.stats, sequential.stats);
        assert_eq!(parallel.places, sequential.places);
    }

    #[tokio::test]
    async fn test_non_array_document_fails() {
        let orchestrator = AnalysisOrchestrator::new(&AnalysisConfig::default());
        let err = orchestrator
            .run(&json!({"sessions": []}), &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChargeError::NotAnArray { found: "object" }));
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_task_error() {
        let orchestrator = AnalysisOrchestrator::new(&AnalysisConfig::default());
        let handle = orchestrator.spawn("boom", || -> usize { panic!("job exploded") });
        let err = join("boom", handle).await.unwrap_err();
        match err {
            ChargeError::Task(msg) => assert!(msg.starts_with("boom")),
            other => panic!("expected Task error, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_limit_is_respected() {
        let config = AnalysisConfig {
            workers: 2,
            ..AnalysisConfig::default()
        };
        let orchestrator = AnalysisOrchestrator::new(&config);
        assert_eq!(orchestrator.workers(), 2);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
                orchestrator.spawn("sleeper", move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            join("sleeper", handle).await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
