//! Fixtures shared by the unit tests of this crate.

use chrono::{DateTime, Duration, Utc};
use charge_core::models::{Session, UNKNOWN_LOCATION, UNKNOWN_PROVIDER};
use serde_json::{json, Value};

/// A 30-minute DC session with measured energy and no provider or location.
pub fn make_session(start: DateTime<Utc>, soc_start: f64, soc_end: f64) -> Session {
    Session {
        id: start.timestamp().to_string(),
        start_time: start,
        end_time: start + Duration::minutes(30),
        soc_start,
        soc_end,
        energy_from_grid: 20.0,
        energy_added: 18.0,
        is_energy_estimated: false,
        cost: 0.0,
        efficiency: 0.9,
        location: UNKNOWN_LOCATION.to_string(),
        latitude: 0.0,
        longitude: 0.0,
        avg_power: 50.0,
        power_samples: vec![50.0],
        mileage: 0.0,
        duration_minutes: 30.0,
        provider: UNKNOWN_PROVIDER.to_string(),
    }
}

/// Minimal raw export record at the given coordinates.
pub fn make_located_record(start_epoch: i64, lat: f64, lon: f64, grid_kwh: f64) -> Value {
    json!({
        "startTime": start_epoch,
        "endTime": start_epoch + 1800,
        "displayedStartSoc": 30,
        "displayedSoc": 70,
        "energyConsumedFromPowerGridKwh": grid_kwh,
        "chargingLocation": {
            "formattedAddress": format!("{lat:.4}, {lon:.4}"),
            "mapMatchedLatitude": lat,
            "mapMatchedLongitude": lon
        }
    })
}
