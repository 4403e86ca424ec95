//! Tunable thresholds for the analysis pipeline.
//!
//! Defaults reproduce the figures existing analyses were produced with, so
//! changing any of them breaks numerical parity with those results.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChargeError, Result};

// ── Shared constants ──────────────────────────────────────────────────────────

/// Average grid power (kW) at or above which a session counts as DC charging.
pub const DEFAULT_DC_POWER_THRESHOLD_KW: f64 = 12.0;

/// Grid-to-battery efficiency assumed for DC sessions without a measured value.
pub const DEFAULT_DC_EFFICIENCY: f64 = 0.98;

/// Grid-to-battery efficiency assumed for AC sessions without a measured value.
pub const DEFAULT_AC_EFFICIENCY: f64 = 0.92;

/// Minimum delivered energy (kWh) for a session to feed the capacity estimate.
pub const DEFAULT_CAPACITY_MIN_ENERGY_KWH: f64 = 30.0;

/// Block power (kW) at or above which a block counts towards the peak-rate trend.
pub const DEFAULT_PEAK_POWER_MIN_KW: f64 = 100.0;

/// Length of the provider leaderboards.
pub const DEFAULT_TOP_PROVIDERS: usize = 5;

/// Similarity score (0–100) a provider name must exceed to merge with a known one.
pub const DEFAULT_PROVIDER_MATCH_THRESHOLD: f64 = 90.0;

/// Radius (km) within which two charging locations are the same place.
pub const DEFAULT_CLUSTER_RADIUS_KM: f64 = 0.10;

/// Upload size cap of the export boundary (5 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Size of the worker pool used for independent aggregate computations.
pub const DEFAULT_WORKERS: usize = 4;

// ── FailureCriterion ──────────────────────────────────────────────────────────

/// Rule deciding whether a charging attempt failed.
///
/// Session statistics always use [`FailureCriterion::SocUnchanged`]; the
/// location clustering historically used [`FailureCriterion::ZeroGridEnergy`].
/// Both rules are kept side by side rather than unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCriterion {
    /// End SoC equals start SoC.
    SocUnchanged,
    /// No energy was drawn from the grid.
    #[default]
    ZeroGridEnergy,
}

impl FailureCriterion {
    /// Canonical snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCriterion::SocUnchanged => "soc_unchanged",
            FailureCriterion::ZeroGridEnergy => "zero_grid_energy",
        }
    }
}

// ── AnalysisConfig ────────────────────────────────────────────────────────────

/// Every knob of the normalization and aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// AC/DC boundary in kW, shared by imputation and the energy split.
    pub dc_power_threshold_kw: f64,
    /// Efficiency used to impute delivered energy for DC sessions.
    pub dc_efficiency: f64,
    /// Efficiency used to impute delivered energy for AC sessions.
    pub ac_efficiency: f64,
    /// Sessions delivering less than this (kWh) are ignored for capacity estimates.
    pub capacity_min_energy_kwh: f64,
    /// Only blocks at or above this power (kW) count as a session's peak rate.
    pub peak_power_min_kw: f64,
    /// Number of entries kept in each provider leaderboard.
    pub top_providers: usize,
    /// Fuzzy-match score a provider name must exceed to reuse a known name.
    pub provider_match_threshold: f64,
    /// Clustering radius in kilometres.
    pub cluster_radius_km: f64,
    /// Failure rule used when counting failed visits per place.
    pub cluster_failure: FailureCriterion,
    /// Largest accepted document in bytes.
    pub max_document_bytes: u64,
    /// Concurrent worker jobs when aggregates are computed in parallel.
    pub workers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dc_power_threshold_kw: DEFAULT_DC_POWER_THRESHOLD_KW,
            dc_efficiency: DEFAULT_DC_EFFICIENCY,
            ac_efficiency: DEFAULT_AC_EFFICIENCY,
            capacity_min_energy_kwh: DEFAULT_CAPACITY_MIN_ENERGY_KWH,
            peak_power_min_kw: DEFAULT_PEAK_POWER_MIN_KW,
            top_providers: DEFAULT_TOP_PROVIDERS,
            provider_match_threshold: DEFAULT_PROVIDER_MATCH_THRESHOLD,
            cluster_radius_km: DEFAULT_CLUSTER_RADIUS_KM,
            cluster_failure: FailureCriterion::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config file. Absent fields keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ChargeError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(self.dc_power_threshold_kw > 0.0) {
            return Err(ChargeError::Config(format!(
                "dc_power_threshold_kw must be positive, got {}",
                self.dc_power_threshold_kw
            )));
        }
        for (name, value) in [
            ("dc_efficiency", self.dc_efficiency),
            ("ac_efficiency", self.ac_efficiency),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ChargeError::Config(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.capacity_min_energy_kwh < 0.0 {
            return Err(ChargeError::Config(format!(
                "capacity_min_energy_kwh must not be negative, got {}",
                self.capacity_min_energy_kwh
            )));
        }
        if self.peak_power_min_kw < 0.0 {
            return Err(ChargeError::Config(format!(
                "peak_power_min_kw must not be negative, got {}",
                self.peak_power_min_kw
            )));
        }
        if !(0.0..=100.0).contains(&self.provider_match_threshold) {
            return Err(ChargeError::Config(format!(
                "provider_match_threshold must be in [0, 100], got {}",
                self.provider_match_threshold
            )));
        }
        if !(self.cluster_radius_km > 0.0) {
            return Err(ChargeError::Config(format!(
                "cluster_radius_km must be positive, got {}",
                self.cluster_radius_km
            )));
        }
        if self.workers == 0 {
            return Err(ChargeError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
