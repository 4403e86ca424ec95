//! Greedy proximity clustering of charging locations into places.
//!
//! Each place is anchored at the first coordinate that created it; later
//! coordinates join the nearest anchor closer than the radius. The scan is
//! linear in the number of places, which is fine for a few thousand sessions.

use charge_core::config::{AnalysisConfig, FailureCriterion};
use charge_core::models::{RawSessionRecord, UNKNOWN_LOCATION};
use charge_core::time_utils::{epoch_to_utc, DateRange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two WGS84 points.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

// ── Place ─────────────────────────────────────────────────────────────────────

/// A deduplicated charging location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Anchor latitude (first visit).
    pub latitude: f64,
    /// Anchor longitude (first visit).
    pub longitude: f64,
    pub address: String,
    pub successful_visits: usize,
    pub failed_visits: usize,
}

impl Place {
    pub fn total_visits(&self) -> usize {
        self.successful_visits + self.failed_visits
    }
}

// ── PlaceClusterer ────────────────────────────────────────────────────────────

/// Accumulates visits into places.
#[derive(Debug, Clone)]
pub struct PlaceClusterer {
    radius_km: f64,
    places: Vec<Place>,
}

impl PlaceClusterer {
    pub fn new(radius_km: f64) -> Self {
        Self {
            radius_km,
            places: Vec::new(),
        }
    }

    /// Record one visit and return the index of the place it landed in.
    pub fn add_visit(&mut self, latitude: f64, longitude: f64, address: &str, failed: bool) -> usize {
        let index = match self.nearest_within_radius(latitude, longitude) {
            Some(i) => i,
            None => {
                self.places.push(Place {
                    latitude,
                    longitude,
                    address: address.to_string(),
                    successful_visits: 0,
                    failed_visits: 0,
                });
                self.places.len() - 1
            }
        };

        let place = &mut self.places[index];
        if failed {
            place.failed_visits += 1;
        } else {
            place.successful_visits += 1;
        }
        index
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn into_places(self) -> Vec<Place> {
        self.places
    }

    /// Closest anchor strictly inside the radius; ties keep the older place.
    fn nearest_within_radius(&self, latitude: f64, longitude: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.places.iter().enumerate() {
            let d = haversine_km(p.latitude, p.longitude, latitude, longitude);
            if d < self.radius_km && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Cluster the raw export `records` into places.
///
/// Only records with both coordinates present and non-zero count. With a
/// `range`, records starting outside it (or without a usable start time) are
/// skipped. Failures follow `config.cluster_failure`.
pub fn cluster_places(
    records: &[Value],
    range: Option<&DateRange>,
    config: &AnalysisConfig,
) -> Vec<Place> {
    let mut clusterer = PlaceClusterer::new(config.cluster_radius_km);
    let mut visits = 0usize;

    for value in records {
        let Ok(raw) = RawSessionRecord::deserialize(value) else {
            continue;
        };
        let Some((lat, lon)) = raw.coordinates() else {
            continue;
        };
        if let Some(r) = range {
            match raw.start_time.and_then(epoch_to_utc) {
                Some(ts) if r.contains(ts) => {}
                _ => continue,
            }
        }

        let failed = is_failed_visit(&raw, config.cluster_failure);
        clusterer.add_visit(lat, lon, raw.address().unwrap_or(UNKNOWN_LOCATION), failed);
        visits += 1;
    }

    debug!(
        "Clustered {} visits into {} places (failure rule: {})",
        visits,
        clusterer.places().len(),
        config.cluster_failure.as_str()
    );
    clusterer.into_places()
}

/// A missing grid-energy value counts as 0 kWh.
fn is_failed_visit(raw: &RawSessionRecord, criterion: FailureCriterion) -> bool {
    match criterion {
        FailureCriterion::ZeroGridEnergy => {
            raw.energy_consumed_from_power_grid_kwh.unwrap_or(0.0) == 0.0
        }
        FailureCriterion::SocUnchanged => matches!(
            (raw.displayed_start_soc, raw.displayed_soc),
            (Some(start), Some(end)) if start == end
        ),
    }
}
