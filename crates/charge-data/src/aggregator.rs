//! Fleet-wide statistics over a normalized session list.
//!
//! Each metric group is an independent pure function over `&[Session]`, so
//! callers may evaluate them in any order or in parallel. [`compute_stats`]
//! runs them one after another.

use std::borrow::Cow;
use std::collections::HashMap;

use charge_core::config::AnalysisConfig;
use charge_core::models::{ChargingMode, Session};
use charge_core::time_utils::DateRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battery::{capacity_trend, monthly_capacity_averages, CapacityPoint, MonthlyCapacity};

// ── Result types ──────────────────────────────────────────────────────────────

/// A provider and how many sessions it is credited with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCount {
    pub provider: String,
    pub count: usize,
}

/// Session counts and provider leaderboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub total_sessions: usize,
    /// Sessions whose end SoC equals their start SoC.
    pub failed_sessions: usize,
    pub successful_sessions: usize,
    pub top_successful_providers: Vec<ProviderCount>,
    pub top_failed_providers: Vec<ProviderCount>,
}

/// Energy and cost sums, split by charging mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyTotals {
    pub total_energy_from_grid_kwh: f64,
    pub total_energy_added_kwh: f64,
    /// Sum of per-session `max(grid - added, 0)`.
    pub total_energy_lost_kwh: f64,
    pub dc_energy_kwh: f64,
    pub ac_energy_kwh: f64,
    pub dc_sessions: usize,
    pub ac_sessions: usize,
    pub total_cost: f64,
    pub estimated_sessions: usize,
    /// `true` when any delivered-energy figure was imputed.
    pub uses_estimated_energy: bool,
}

/// Efficiency and consumption per distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyStats {
    /// Total delivered over total grid energy, 0 without grid energy.
    pub overall_efficiency: f64,
    /// Highest positive odometer reading (km).
    pub current_mileage_km: f64,
    pub distance_km: f64,
    /// Grid energy per 100 km.
    pub consumption_kwh_per_100km: f64,
    /// Delivered energy per 100 km.
    pub consumption_kwh_per_100km_without_losses: f64,
}

/// End-SoC distribution over sessions that actually charged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocStats {
    /// Sessions excluded from the buckets because the SoC did not change.
    pub failed_sessions: usize,
    pub below_80: usize,
    pub exactly_80: usize,
    pub above_80: usize,
    pub above_90: usize,
    /// Overlaps with `above_80`.
    pub exactly_100: usize,
    pub average_start_soc: f64,
    pub average_end_soc: f64,
    /// 0 when there is no successful session.
    pub lowest_start_soc: f64,
    pub above_80_percentage: f64,
    pub above_90_percentage: f64,
}

/// Highest fast-charging block power of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakPowerPoint {
    /// When the first qualifying block started.
    pub date: DateTime<Utc>,
    pub peak_power_kw: f64,
}

/// Everything the statistics engine derives from one session list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub sessions: SessionTotals,
    pub energy: EnergyTotals,
    pub efficiency: EfficiencyStats,
    pub soc: SocStats,
    pub capacity_trend: Vec<CapacityPoint>,
    pub monthly_capacity: Vec<MonthlyCapacity>,
    pub peak_power_trend: Vec<PeakPowerPoint>,
}

impl AggregateStats {
    /// Assemble the result from independently computed parts.
    pub fn from_parts(
        sessions: SessionTotals,
        energy: EnergyTotals,
        efficiency: EfficiencyStats,
        soc: SocStats,
        capacity_trend: Vec<CapacityPoint>,
        peak_power_trend: Vec<PeakPowerPoint>,
    ) -> Self {
        let monthly_capacity = monthly_capacity_averages(&capacity_trend);
        Self {
            sessions,
            energy,
            efficiency,
            soc,
            capacity_trend,
            monthly_capacity,
            peak_power_trend,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Sessions starting inside `range`, or all of them without a range.
pub fn sessions_in_range<'a>(
    sessions: &'a [Session],
    range: Option<&DateRange>,
) -> Cow<'a, [Session]> {
    match range {
        Some(r) => Cow::Owned(
            sessions
                .iter()
                .filter(|s| r.contains(s.start_time))
                .cloned()
                .collect(),
        ),
        None => Cow::Borrowed(sessions),
    }
}

/// Filter by `range` and compute every metric group.
pub fn compute_stats(
    sessions: &[Session],
    range: Option<&DateRange>,
    config: &AnalysisConfig,
) -> AggregateStats {
    let selected = sessions_in_range(sessions, range);
    let selected: &[Session] = &selected;

    AggregateStats::from_parts(
        session_totals(selected, config.top_providers),
        energy_totals(selected, config.dc_power_threshold_kw),
        efficiency_stats(selected, range.is_some()),
        soc_stats(selected),
        capacity_trend(selected, config.capacity_min_energy_kwh),
        peak_power_trend(selected, config.peak_power_min_kw),
    )
}

/// Success/failure counts and the top `top_n` providers for each.
pub fn session_totals(sessions: &[Session], top_n: usize) -> SessionTotals {
    let mut successful = ProviderTally::default();
    let mut failed = ProviderTally::default();
    let mut failed_sessions = 0;

    for s in sessions {
        let tally = if s.is_failed() {
            failed_sessions += 1;
            &mut failed
        } else {
            &mut successful
        };
        if s.has_known_provider() {
            tally.add(&s.provider);
        }
    }

    SessionTotals {
        total_sessions: sessions.len(),
        failed_sessions,
        successful_sessions: sessions.len() - failed_sessions,
        top_successful_providers: successful.top(top_n),
        top_failed_providers: failed.top(top_n),
    }
}

/// Energy, cost and mode split using `dc_threshold_kw` as the AC/DC boundary.
pub fn energy_totals(sessions: &[Session], dc_threshold_kw: f64) -> EnergyTotals {
    let mut totals = EnergyTotals::default();
    for s in sessions {
        totals.total_energy_from_grid_kwh += s.energy_from_grid;
        totals.total_energy_added_kwh += s.energy_added;
        totals.total_energy_lost_kwh += s.energy_lost_kwh();
        totals.total_cost += s.cost;
        match s.charging_mode(dc_threshold_kw) {
            ChargingMode::Dc => {
                totals.dc_energy_kwh += s.energy_added;
                totals.dc_sessions += 1;
            }
            ChargingMode::Ac => {
                totals.ac_energy_kwh += s.energy_added;
                totals.ac_sessions += 1;
            }
        }
        if s.is_energy_estimated {
            totals.estimated_sessions += 1;
        }
    }
    totals.uses_estimated_energy = totals.estimated_sessions > 0;
    totals
}

/// Overall efficiency and consumption.
///
/// Odometer readings of 0 are unknown and ignored. With an active date range
/// the distance is the spread of readings inside it; without one it is the
/// highest reading.
pub fn efficiency_stats(sessions: &[Session], date_range_active: bool) -> EfficiencyStats {
    let grid: f64 = sessions.iter().map(|s| s.energy_from_grid).sum();
    let added: f64 = sessions.iter().map(|s| s.energy_added).sum();

    let readings = sessions.iter().map(|s| s.mileage).filter(|m| *m > 0.0);
    let (min_km, max_km) = readings.fold((None::<f64>, None::<f64>), |(lo, hi), m| {
        (
            Some(lo.map_or(m, |v| v.min(m))),
            Some(hi.map_or(m, |v| v.max(m))),
        )
    });
    let current_mileage_km = max_km.unwrap_or(0.0);
    let distance_km = if date_range_active {
        match (min_km, max_km) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        }
    } else {
        current_mileage_km
    };

    let per_100km = |energy: f64| {
        if distance_km > 0.0 {
            energy / distance_km * 100.0
        } else {
            0.0
        }
    };

    EfficiencyStats {
        overall_efficiency: if grid > 0.0 { added / grid } else { 0.0 },
        current_mileage_km,
        distance_km,
        consumption_kwh_per_100km: per_100km(grid),
        consumption_kwh_per_100km_without_losses: per_100km(added),
    }
}

/// End-SoC buckets and averages.
///
/// Buckets are evaluated in order failed → <80 → ==80 → >80; `exactly_100`
/// and `above_90` are counted independently of the bucket.
pub fn soc_stats(sessions: &[Session]) -> SocStats {
    let mut stats = SocStats::default();
    let mut start_sum = 0.0;
    let mut end_sum = 0.0;
    let mut lowest_start: Option<f64> = None;
    let mut valid = 0usize;

    for s in sessions {
        if s.is_failed() {
            stats.failed_sessions += 1;
            continue;
        }
        valid += 1;
        start_sum += s.soc_start;
        end_sum += s.soc_end;
        lowest_start = Some(lowest_start.map_or(s.soc_start, |v| v.min(s.soc_start)));

        if s.soc_end < 80.0 {
            stats.below_80 += 1;
        } else if s.soc_end == 80.0 {
            stats.exactly_80 += 1;
        } else {
            stats.above_80 += 1;
        }
        if s.soc_end > 90.0 {
            stats.above_90 += 1;
        }
        if s.soc_end == 100.0 {
            stats.exactly_100 += 1;
        }
    }

    if valid > 0 {
        let n = valid as f64;
        stats.average_start_soc = start_sum / n;
        stats.average_end_soc = end_sum / n;
        stats.above_80_percentage = stats.above_80 as f64 / n * 100.0;
        stats.above_90_percentage = stats.above_90 as f64 / n * 100.0;
    }
    stats.lowest_start_soc = lowest_start.unwrap_or(0.0);
    stats
}

/// Peak block power per session, counting only blocks at or above `min_kw`.
///
/// Sessions without such a block are skipped. Points are ordered by date;
/// each is dated at the first qualifying block of its session.
pub fn peak_power_trend(sessions: &[Session], min_kw: f64) -> Vec<PeakPowerPoint> {
    let mut points: Vec<PeakPowerPoint> = sessions
        .iter()
        .filter_map(|s| {
            let fast: Vec<(DateTime<Utc>, f64)> = s
                .power_timeline()
                .into_iter()
                .filter(|(_, kw)| *kw >= min_kw)
                .collect();
            let (date, _) = *fast.first()?;
            let peak_power_kw = fast.iter().map(|(_, kw)| *kw).fold(f64::MIN, f64::max);
            Some(PeakPowerPoint {
                date,
                peak_power_kw,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Per-provider counts that remember first-encounter order.
#[derive(Default)]
struct ProviderTally {
    order: Vec<ProviderCount>,
    index: HashMap<String, usize>,
}

impl ProviderTally {
    fn add(&mut self, provider: &str) {
        match self.index.get(provider) {
            Some(&i) => self.order[i].count += 1,
            None => {
                self.index.insert(provider.to_string(), self.order.len());
                self.order.push(ProviderCount {
                    provider: provider.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Highest counts first; equal counts keep encounter order.
    fn top(mut self, n: usize) -> Vec<ProviderCount> {
        self.order.sort_by(|a, b| b.count.cmp(&a.count));
        self.order.truncate(n);
        self.order
    }
}
