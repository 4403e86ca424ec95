//! Plain-text rendering of an [`AnalysisResult`].

use std::fmt;

use charge_core::formatting::{
    format_currency, format_distance, format_energy, format_number, percentage, KM_TO_MILES,
};
use charge_core::time_utils::TimezoneHandler;
use charge_data::aggregator::ProviderCount;
use charge_data::analysis::AnalysisResult;
use charge_data::clustering::Place;

const TOP_PLACES: usize = 5;
const RECENT_MONTHS: usize = 6;

/// Text summary printed by the CLI.
pub struct TextReport<'a> {
    result: &'a AnalysisResult,
    tz: &'a TimezoneHandler,
    miles: bool,
}

impl<'a> TextReport<'a> {
    pub fn new(result: &'a AnalysisResult, tz: &'a TimezoneHandler, miles: bool) -> Self {
        Self { result, tz, miles }
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.result.metadata;
        writeln!(f, "Charging history")?;
        match &meta.date_range {
            Some(range) => writeln!(
                f,
                "  Period:   {} to {} ({})",
                self.tz.to_local(range.start).format("%Y-%m-%d %H:%M"),
                self.tz.to_local(range.end).format("%Y-%m-%d %H:%M"),
                self.tz.default_tz()
            )?,
            None => writeln!(f, "  Period:   all sessions")?,
        }
        writeln!(
            f,
            "  Records:  {} read, {} skipped, {} analysed",
            meta.records_total, meta.records_dropped, meta.sessions_analyzed
        )
    }

    fn write_sessions(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = &self.result.stats.sessions;
        let energy = &self.result.stats.energy;
        writeln!(f, "\nSessions")?;
        writeln!(
            f,
            "  Total {}   Successful {}   Failed {}",
            totals.total_sessions, totals.successful_sessions, totals.failed_sessions
        )?;
        writeln!(f, "  AC {}   DC {}", energy.ac_sessions, energy.dc_sessions)
    }

    fn write_energy(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let energy = &self.result.stats.energy;
        writeln!(f, "\nEnergy")?;
        writeln!(f, "  From grid:   {}", format_energy(energy.total_energy_from_grid_kwh))?;
        writeln!(f, "  To battery:  {}", format_energy(energy.total_energy_added_kwh))?;
        writeln!(f, "  Lost:        {}", format_energy(energy.total_energy_lost_kwh))?;
        writeln!(
            f,
            "  DC / AC:     {} / {}",
            format_energy(energy.dc_energy_kwh),
            format_energy(energy.ac_energy_kwh)
        )?;
        writeln!(f, "  Cost:        {}", format_currency(energy.total_cost))
    }

    fn write_efficiency(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let eff = &self.result.stats.efficiency;
        let (unit, factor) = if self.miles {
            ("100 mi", 1.0 / KM_TO_MILES)
        } else {
            ("100 km", 1.0)
        };
        writeln!(f, "\nEfficiency")?;
        writeln!(
            f,
            "  Overall:     {}%",
            format_number(eff.overall_efficiency * 100.0, 1)
        )?;
        writeln!(f, "  Odometer:    {}", format_distance(eff.current_mileage_km, self.miles))?;
        writeln!(f, "  Distance:    {}", format_distance(eff.distance_km, self.miles))?;
        writeln!(
            f,
            "  Consumption: {} kWh/{unit} ({} kWh/{unit} without grid losses)",
            format_number(eff.consumption_kwh_per_100km * factor, 1),
            format_number(eff.consumption_kwh_per_100km_without_losses * factor, 1)
        )
    }

    fn write_soc(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let soc = &self.result.stats.soc;
        writeln!(f, "\nEnd state of charge")?;
        writeln!(
            f,
            "  <80% {}   =80% {}   >80% {} ({}%)   >90% {} ({}%)   =100% {}",
            soc.below_80,
            soc.exactly_80,
            soc.above_80,
            format_number(soc.above_80_percentage, 1),
            soc.above_90,
            format_number(soc.above_90_percentage, 1),
            soc.exactly_100
        )?;
        writeln!(
            f,
            "  Average start {}%   Average end {}%   Lowest start {}%",
            format_number(soc.average_start_soc, 1),
            format_number(soc.average_end_soc, 1),
            format_number(soc.lowest_start_soc, 0)
        )
    }

    fn write_capacity(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let monthly = &self.result.stats.monthly_capacity;
        if monthly.is_empty() {
            return Ok(());
        }
        writeln!(f, "\nEstimated battery capacity")?;
        let skip = monthly.len().saturating_sub(RECENT_MONTHS);
        for m in &monthly[skip..] {
            writeln!(
                f,
                "  {}  {} ({} sessions)",
                m.month,
                format_energy(m.average_capacity_kwh),
                m.points
            )?;
        }
        Ok(())
    }

    fn write_peak_power(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peaks = &self.result.stats.peak_power_trend;
        let Some(highest) = peaks.iter().map(|p| p.peak_power_kw).reduce(f64::max) else {
            return Ok(());
        };
        writeln!(f, "\nPeak charging rate")?;
        writeln!(
            f,
            "  Highest {} kW over {} fast sessions",
            format_number(highest, 1),
            peaks.len()
        )?;
        if let Some(last) = peaks.last() {
            writeln!(
                f,
                "  Latest  {} kW on {}",
                format_number(last.peak_power_kw, 1),
                self.tz.to_local(last.date).format("%Y-%m-%d")
            )?;
        }
        Ok(())
    }

    fn write_providers(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = &self.result.stats.sessions;
        write_leaderboard(f, "Top providers (successful)", &totals.top_successful_providers)?;
        write_leaderboard(f, "Top providers (failed)", &totals.top_failed_providers)
    }

    fn write_places(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.result.places.is_empty() {
            return Ok(());
        }
        writeln!(f, "\nMost visited places")?;
        for place in busiest_places(&self.result.places, TOP_PLACES) {
            writeln!(
                f,
                "  {:>4} visits ({} failed)  {}",
                place.total_visits(),
                place.failed_visits,
                place.address
            )?;
        }
        Ok(())
    }

    fn write_warning(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let energy = &self.result.stats.energy;
        if !energy.uses_estimated_energy {
            return Ok(());
        }
        writeln!(
            f,
            "\nNote: {} of {} sessions ({}%) lack a measured battery energy value; \
             their delivered energy was estimated from grid energy.",
            energy.estimated_sessions,
            self.result.stats.sessions.total_sessions,
            format_number(
                percentage(
                    energy.estimated_sessions as f64,
                    self.result.stats.sessions.total_sessions as f64,
                    1
                ),
                1
            )
        )
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        self.write_sessions(f)?;
        self.write_energy(f)?;
        self.write_efficiency(f)?;
        self.write_soc(f)?;
        self.write_capacity(f)?;
        self.write_peak_power(f)?;
        self.write_providers(f)?;
        self.write_places(f)?;
        self.write_warning(f)
    }
}

fn write_leaderboard(f: &mut fmt::Formatter<'_>, title: &str, rows: &[ProviderCount]) -> fmt::Result {
    writeln!(f, "\n{title}")?;
    if rows.is_empty() {
        return writeln!(f, "  (none)");
    }
    for (rank, row) in rows.iter().enumerate() {
        writeln!(f, "  {}. {}  {}", rank + 1, row.provider, row.count)?;
    }
    Ok(())
}

/// Places with the most visits first; equal totals keep discovery order.
fn busiest_places(places: &[Place], n: usize) -> Vec<&Place> {
    let mut sorted: Vec<&Place> = places.iter().collect();
    sorted.sort_by(|a, b| b.total_visits().cmp(&a.total_visits()));
    sorted.truncate(n);
    sorted
}
