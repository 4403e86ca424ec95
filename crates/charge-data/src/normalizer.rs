//! Raw export record → canonical [`Session`].
//!
//! Records are decoded one at a time so a single malformed element is
//! dropped without affecting the rest of the batch.

use charge_core::config::AnalysisConfig;
use charge_core::models::{ChargingMode, RawSessionRecord, Session, UNKNOWN_LOCATION, UNKNOWN_PROVIDER};
use charge_core::time_utils::epoch_to_utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::providers::ProviderRegistry;

// ── NormalizeReport ───────────────────────────────────────────────────────────

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeReport {
    /// Sessions in input order.
    pub sessions: Vec<Session>,
    /// Elements in the input array.
    pub records_total: usize,
    /// Elements skipped because they were malformed or incomplete.
    pub records_dropped: usize,
    /// Sessions whose delivered energy was imputed.
    pub estimated_sessions: usize,
}

/// Why a record did not become a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    Undecodable,
    Missing(&'static str),
    BadTimestamp(&'static str),
}

// ── SessionNormalizer ─────────────────────────────────────────────────────────

/// Converts raw records into sessions using the configured AC/DC model.
#[derive(Debug, Clone)]
pub struct SessionNormalizer {
    dc_threshold_kw: f64,
    dc_efficiency: f64,
    ac_efficiency: f64,
}

impl SessionNormalizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            dc_threshold_kw: config.dc_power_threshold_kw,
            dc_efficiency: config.dc_efficiency,
            ac_efficiency: config.ac_efficiency,
        }
    }

    /// Normalize every element of `records` in order.
    ///
    /// Provider names are reconciled through `registry`, which the caller owns
    /// and should create fresh for each document.
    pub fn normalize(&self, records: &[Value], registry: &mut ProviderRegistry) -> NormalizeReport {
        let mut report = NormalizeReport {
            records_total: records.len(),
            ..NormalizeReport::default()
        };

        for (index, value) in records.iter().enumerate() {
            let outcome = RawSessionRecord::deserialize(value)
                .map_err(|_| DropReason::Undecodable)
                .and_then(|raw| self.build_session(&raw, registry));

            match outcome {
                Ok(session) => {
                    if session.is_energy_estimated {
                        report.estimated_sessions += 1;
                    }
                    report.sessions.push(session);
                }
                Err(reason) => {
                    debug!("Dropping record {}: {:?}", index, reason);
                    report.records_dropped += 1;
                }
            }
        }

        debug!(
            "Normalized {} of {} records ({} estimated)",
            report.sessions.len(),
            report.records_total,
            report.estimated_sessions
        );
        report
    }

    /// Delivered energy imputed from grid energy and the charging mode.
    pub fn impute_energy_added(&self, energy_from_grid: f64, avg_power_kw: f64) -> f64 {
        match ChargingMode::classify(avg_power_kw, self.dc_threshold_kw) {
            ChargingMode::Dc => energy_from_grid * self.dc_efficiency,
            ChargingMode::Ac => energy_from_grid * self.ac_efficiency,
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn build_session(
        &self,
        raw: &RawSessionRecord,
        registry: &mut ProviderRegistry,
    ) -> Result<Session, DropReason> {
        let start_epoch = raw.start_time.ok_or(DropReason::Missing("startTime"))?;
        let end_epoch = raw.end_time.ok_or(DropReason::Missing("endTime"))?;
        let soc_start = raw
            .displayed_start_soc
            .ok_or(DropReason::Missing("displayedStartSoc"))?;
        let soc_end = raw.displayed_soc.ok_or(DropReason::Missing("displayedSoc"))?;
        let energy_from_grid = raw
            .energy_consumed_from_power_grid_kwh
            .ok_or(DropReason::Missing("energyConsumedFromPowerGridKwh"))?;

        let start_time = epoch_to_utc(start_epoch).ok_or(DropReason::BadTimestamp("startTime"))?;
        let end_time = epoch_to_utc(end_epoch).ok_or(DropReason::BadTimestamp("endTime"))?;

        let power_samples = raw.block_powers();
        let avg_power = raw.average_block_power();

        let (energy_added, is_energy_estimated) = match raw.energy_increase_hvb_kwh {
            Some(measured) => (measured, false),
            None => (self.impute_energy_added(energy_from_grid, avg_power), true),
        };

        let efficiency = if energy_from_grid > 0.0 {
            energy_added / energy_from_grid
        } else {
            0.0
        };

        let (latitude, longitude) = raw
            .charging_location
            .as_ref()
            .map(|loc| {
                (
                    loc.map_matched_latitude.unwrap_or(0.0),
                    loc.map_matched_longitude.unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));

        let provider = match raw.first_provider_name().map(str::trim) {
            Some(name) if !name.is_empty() && name != UNKNOWN_PROVIDER => {
                registry.reconcile(name)
            }
            _ => UNKNOWN_PROVIDER.to_string(),
        };

        Ok(Session {
            id: epoch_id(start_epoch),
            start_time,
            end_time,
            soc_start,
            soc_end,
            energy_from_grid,
            energy_added,
            is_energy_estimated,
            cost: raw
                .charging_cost_information
                .as_ref()
                .and_then(|c| c.calculated_charging_cost)
                .unwrap_or(0.0),
            efficiency,
            location: raw.address().unwrap_or(UNKNOWN_LOCATION).to_string(),
            latitude,
            longitude,
            avg_power,
            power_samples,
            mileage: raw.mileage.unwrap_or(0.0),
            duration_minutes: (end_time - start_time).num_milliseconds() as f64 / 60_000.0,
            provider,
        })
    }
}

/// Start epoch rendered without a trailing `.0` for whole seconds.
fn epoch_id(epoch: f64) -> String {
    if epoch.fract() == 0.0 {
        format!("{}", epoch as i64)
    } else {
        epoch.to_string()
    }
}
