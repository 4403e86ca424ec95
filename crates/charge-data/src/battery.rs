//! Battery capacity estimates from large charging sessions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use charge_core::models::Session;
use serde::{Deserialize, Serialize};

/// One capacity estimate derived from a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPoint {
    /// Session start.
    pub date: DateTime<Utc>,
    /// `energy_added * 100 / soc_change` (kWh), 0 when the SoC did not move.
    pub estimated_capacity_kwh: f64,
    /// SoC change in percentage points.
    pub soc_change: f64,
}

/// SoC-change-weighted mean of the capacity estimates of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCapacity {
    /// `YYYY-MM` (UTC).
    pub month: String,
    pub average_capacity_kwh: f64,
    /// Points that contributed.
    pub points: usize,
    /// Sum of the contributing SoC changes.
    pub total_soc_change: f64,
}

/// One point per session delivering at least `min_energy_kwh`, in input order.
///
/// Small top-ups are skipped since their SoC delta is too coarse to
/// extrapolate a pack size from.
pub fn capacity_trend(sessions: &[Session], min_energy_kwh: f64) -> Vec<CapacityPoint> {
    sessions
        .iter()
        .filter(|s| s.energy_added >= min_energy_kwh)
        .map(|s| {
            let soc_change = s.soc_change();
            let estimated_capacity_kwh = if soc_change != 0.0 {
                s.energy_added * 100.0 / soc_change
            } else {
                0.0
            };
            CapacityPoint {
                date: s.start_time,
                estimated_capacity_kwh,
                soc_change,
            }
        })
        .collect()
}

/// Group `points` by calendar month, oldest first.
///
/// Points with a non-positive SoC change carry no weight and are skipped.
pub fn monthly_capacity_averages(points: &[CapacityPoint]) -> Vec<MonthlyCapacity> {
    // month -> (weighted sum, weight, count)
    let mut buckets: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
    for p in points.iter().filter(|p| p.soc_change > 0.0) {
        let bucket = buckets
            .entry(p.date.format("%Y-%m").to_string())
            .or_insert((0.0, 0.0, 0));
        bucket.0 += p.estimated_capacity_kwh * p.soc_change;
        bucket.1 += p.soc_change;
        bucket.2 += 1;
    }

    buckets
        .into_iter()
        .map(|(month, (weighted, weight, count))| MonthlyCapacity {
            month,
            average_capacity_kwh: weighted / weight,
            points: count,
            total_soc_change: weight,
        })
        .collect()
}
