use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Provider name used when the export carries no charging-point match.
pub const UNKNOWN_PROVIDER: &str = "Unknown";

/// Location label used when the export carries no address.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

// ── Raw vendor schema ─────────────────────────────────────────────────────────

/// One element of the vendor charging-history export, exactly as exported.
///
/// Every field is optional so a record can be decoded first and validated
/// afterwards; the normalizer decides which absences are fatal for the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSessionRecord {
    /// Plug-in time, epoch seconds.
    #[serde(default)]
    pub start_time: Option<f64>,
    /// Plug-out time, epoch seconds.
    #[serde(default)]
    pub end_time: Option<f64>,
    /// SoC shown to the driver at plug-in (%).
    #[serde(default)]
    pub displayed_start_soc: Option<f64>,
    /// SoC shown to the driver at plug-out (%).
    #[serde(default)]
    pub displayed_soc: Option<f64>,
    /// Energy drawn from the grid (kWh).
    #[serde(default)]
    pub energy_consumed_from_power_grid_kwh: Option<f64>,
    /// Energy that reached the high-voltage battery (kWh). Older exports omit it.
    #[serde(default)]
    pub energy_increase_hvb_kwh: Option<f64>,
    #[serde(default)]
    pub charging_cost_information: Option<RawCostInformation>,
    #[serde(default)]
    pub charging_location: Option<RawChargingLocation>,
    #[serde(default)]
    pub charging_blocks: Option<Vec<RawChargingBlock>>,
    #[serde(default)]
    pub public_charging_point: Option<RawPublicChargingPoint>,
    /// Odometer reading at the session (km).
    #[serde(default)]
    pub mileage: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCostInformation {
    #[serde(default)]
    pub calculated_charging_cost: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChargingLocation {
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub map_matched_latitude: Option<f64>,
    #[serde(default)]
    pub map_matched_longitude: Option<f64>,
}

/// A slice of the session with roughly constant charging power.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChargingBlock {
    #[serde(default)]
    pub average_power_grid_kw: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPublicChargingPoint {
    #[serde(default)]
    pub potential_charging_point_matches: Option<Vec<RawChargingPointMatch>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChargingPointMatch {
    #[serde(default)]
    pub provider_name: Option<String>,
}

impl RawSessionRecord {
    /// Per-block average grid power in export order; a block without a
    /// reading counts as 0 kW.
    pub fn block_powers(&self) -> Vec<f64> {
        self.charging_blocks
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|b| b.average_power_grid_kw.unwrap_or(0.0))
            .collect()
    }

    /// Mean of the block powers, 0 when there are no blocks.
    pub fn average_block_power(&self) -> f64 {
        let powers = self.block_powers();
        if powers.is_empty() {
            return 0.0;
        }
        powers.iter().sum::<f64>() / powers.len() as f64
    }

    /// Provider name of the first charging-point match, if any.
    pub fn first_provider_name(&self) -> Option<&str> {
        self.public_charging_point
            .as_ref()?
            .potential_charging_point_matches
            .as_ref()?
            .first()?
            .provider_name
            .as_deref()
    }

    /// `(latitude, longitude)` when both are present and non-zero.
    ///
    /// The export writes 0 for unknown coordinates.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let loc = self.charging_location.as_ref()?;
        match (loc.map_matched_latitude, loc.map_matched_longitude) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
            _ => None,
        }
    }

    /// Address text of the charging location, if non-empty.
    pub fn address(&self) -> Option<&str> {
        self.charging_location
            .as_ref()?
            .formatted_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
    }
}

// ── ChargingMode ──────────────────────────────────────────────────────────────

/// AC or DC charging, decided by average grid power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargingMode {
    Ac,
    Dc,
}

impl ChargingMode {
    /// DC when `avg_power_kw >= threshold_kw`, AC otherwise.
    pub fn classify(avg_power_kw: f64, threshold_kw: f64) -> Self {
        if avg_power_kw >= threshold_kw {
            ChargingMode::Dc
        } else {
            ChargingMode::Ac
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargingMode::Ac => "AC",
            ChargingMode::Dc => "DC",
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// A normalized charging session.
///
/// Built once by the normalizer and only read afterwards. Timestamps
/// serialize as RFC 3339 strings so the record survives a round trip through
/// client-held JSON state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Start epoch seconds as a string.
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// SoC at plug-in (%).
    pub soc_start: f64,
    /// SoC at plug-out (%).
    pub soc_end: f64,
    /// Energy drawn from the grid (kWh).
    pub energy_from_grid: f64,
    /// Energy delivered to the battery (kWh), measured or imputed.
    pub energy_added: f64,
    /// `true` when `energy_added` was imputed from the charging mode.
    pub is_energy_estimated: bool,
    /// Charging cost in the export's currency.
    pub cost: f64,
    /// `energy_added / energy_from_grid`, 0 without grid energy. Not clamped.
    pub efficiency: f64,
    pub location: String,
    /// Latitude in degrees, 0 when unknown.
    pub latitude: f64,
    /// Longitude in degrees, 0 when unknown.
    pub longitude: f64,
    /// Mean block grid power (kW), 0 without blocks.
    pub avg_power: f64,
    /// Average grid power of every block, in export order (kW).
    pub power_samples: Vec<f64>,
    /// Odometer reading (km), 0 when unknown.
    pub mileage: f64,
    pub duration_minutes: f64,
    /// Reconciled provider name.
    pub provider: String,
}

impl Session {
    /// No net charge: end SoC equals start SoC.
    pub fn is_failed(&self) -> bool {
        self.soc_end == self.soc_start
    }

    /// `soc_end - soc_start` in percentage points.
    pub fn soc_change(&self) -> f64 {
        self.soc_end - self.soc_start
    }

    pub fn charging_mode(&self, threshold_kw: f64) -> ChargingMode {
        ChargingMode::classify(self.avg_power, threshold_kw)
    }

    /// Conversion loss between grid and battery (kWh), never negative.
    pub fn energy_lost_kwh(&self) -> f64 {
        (self.energy_from_grid - self.energy_added).max(0.0)
    }

    pub fn has_known_provider(&self) -> bool {
        !self.provider.is_empty() && self.provider != UNKNOWN_PROVIDER
    }

    /// Block powers spread evenly over the session.
    ///
    /// Sample `i` sits at `start + i * duration / n`.
    pub fn power_timeline(&self) -> Vec<(DateTime<Utc>, f64)> {
        let n = self.power_samples.len();
        if n == 0 {
            return Vec::new();
        }
        let total_ms = (self.end_time - self.start_time).num_milliseconds();
        self.power_samples
            .iter()
            .enumerate()
            .map(|(i, &kw)| {
                let offset = Duration::milliseconds(total_ms * i as i64 / n as i64);
                (self.start_time + offset, kw)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub(crate) fn make_session(soc_start: f64, soc_end: f64, avg_power: f64) -> Session {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Session {
            id: start.timestamp().to_string(),
            start_time: start,
            end_time: start + Duration::minutes(40),
            soc_start,
            soc_end,
            energy_from_grid: 20.0,
            energy_added: 18.4,
            is_energy_estimated: false,
            cost: 9.5,
            efficiency: 0.92,
            location: "Ludwigstraße 1, München".to_string(),
            latitude: 48.1351,
            longitude: 11.582,
            avg_power,
            power_samples: vec![avg_power],
            mileage: 12_000.0,
            duration_minutes: 40.0,
            provider: "IONITY".to_string(),
        }
    }

    // ── RawSessionRecord ──────────────────────────────────────────────────────

    #[test]
    fn test_raw_record_decodes_vendor_field_names() {
        let raw: RawSessionRecord = serde_json::from_value(json!({
            "startTime": 1_714_550_400,
            "endTime": 1_714_552_800,
            "displayedStartSoc": 20,
            "displayedSoc": 80,
            "energyConsumedFromPowerGridKwh": 45.2,
            "chargingCostInformation": {"calculatedChargingCost": 21.9},
            "chargingLocation": {
                "formattedAddress": "Autohof 3, Ingolstadt",
                "mapMatchedLatitude": 48.76,
                "mapMatchedLongitude": 11.42
            },
            "chargingBlocks": [{"averagePowerGridKw": 140.0}, {"averagePowerGridKw": 60.0}],
            "publicChargingPoint": {
                "potentialChargingPointMatches": [{"providerName": "IONITY HPC GmbH"}]
            },
            "mileage": 23_451,
            "isPreconditioningActivated": true
        }))
        .unwrap();

        assert_eq!(raw.start_time, Some(1_714_550_400.0));
        assert_eq!(raw.displayed_soc, Some(80.0));
        assert!(raw.energy_increase_hvb_kwh.is_none());
        assert_eq!(raw.block_powers(), vec![140.0, 60.0]);
        assert!((raw.average_block_power() - 100.0).abs() < 1e-9);
        assert_eq!(raw.first_provider_name(), Some("IONITY HPC GmbH"));
        assert_eq!(raw.coordinates(), Some((48.76, 11.42)));
        assert_eq!(raw.address(), Some("Autohof 3, Ingolstadt"));
    }

    #[test]
    fn test_raw_record_empty_object() {
        let raw: RawSessionRecord = serde_json::from_value(json!({})).unwrap();
        assert!(raw.start_time.is_none());
        assert!(raw.block_powers().is_empty());
        assert_eq!(raw.average_block_power(), 0.0);
        assert!(raw.first_provider_name().is_none());
        assert!(raw.coordinates().is_none());
        assert!(raw.address().is_none());
    }

    #[test]
    fn test_raw_record_wrong_type_fails_to_decode() {
        let res = serde_json::from_value::<RawSessionRecord>(json!({"displayedSoc": "eighty"}));
        assert!(res.is_err());
    }

    #[test]
    fn test_raw_record_block_without_power_counts_as_zero() {
        let raw: RawSessionRecord = serde_json::from_value(json!({
            "chargingBlocks": [{"averagePowerGridKw": 11.0}, {}]
        }))
        .unwrap();
        assert_eq!(raw.block_powers(), vec![11.0, 0.0]);
        assert!((raw.average_block_power() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_raw_record_zero_coordinates_are_unknown() {
        let raw: RawSessionRecord = serde_json::from_value(json!({
            "chargingLocation": {"mapMatchedLatitude": 0, "mapMatchedLongitude": 11.5}
        }))
        .unwrap();
        assert!(raw.coordinates().is_none());
    }

    #[test]
    fn test_raw_record_empty_match_list() {
        let raw: RawSessionRecord = serde_json::from_value(json!({
            "publicChargingPoint": {"potentialChargingPointMatches": []}
        }))
        .unwrap();
        assert!(raw.first_provider_name().is_none());
    }

    // ── ChargingMode ──────────────────────────────────────────────────────────

    #[test]
    fn test_charging_mode_boundary_is_dc() {
        assert_eq!(ChargingMode::classify(12.0, 12.0), ChargingMode::Dc);
        assert_eq!(ChargingMode::classify(11.999, 12.0), ChargingMode::Ac);
        assert_eq!(ChargingMode::classify(0.0, 12.0), ChargingMode::Ac);
    }

    #[test]
    fn test_charging_mode_serde() {
        assert_eq!(serde_json::to_string(&ChargingMode::Dc).unwrap(), r#""DC""#);
        assert_eq!(ChargingMode::Ac.as_str(), "AC");
    }

    // ── Session ───────────────────────────────────────────────────────────────

    #[test]
    fn test_session_failed_when_soc_unchanged() {
        assert!(make_session(50.0, 50.0, 11.0).is_failed());
        assert!(!make_session(50.0, 51.0, 11.0).is_failed());
    }

    #[test]
    fn test_session_energy_lost() {
        let s = make_session(20.0, 80.0, 50.0);
        assert!((s.energy_lost_kwh() - 1.6).abs() < 1e-9);

        let mut over = make_session(20.0, 80.0, 50.0);
        over.energy_added = 25.0;
        assert_eq!(over.energy_lost_kwh(), 0.0);
    }

    #[test]
    fn test_session_timestamps_round_trip_as_strings() {
        let s = make_session(20.0, 80.0, 50.0);
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["start_time"], json!("2024-05-01T08:00:00Z"));

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_power_timeline_spreads_samples() {
        let mut s = make_session(20.0, 80.0, 50.0);
        s.power_samples = vec![100.0, 80.0, 40.0, 20.0];
        let timeline = s.power_timeline();
        assert_eq!(timeline.len(), 4);
        assert_eq!(timeline[0].0, s.start_time);
        assert_eq!(timeline[1].0, s.start_time + Duration::minutes(10));
        assert_eq!(timeline[3].0, s.start_time + Duration::minutes(30));
        assert_eq!(timeline[2].1, 40.0);
    }

    #[test]
    fn test_power_timeline_empty() {
        let mut s = make_session(20.0, 80.0, 0.0);
        s.power_samples.clear();
        assert!(s.power_timeline().is_empty());
    }

    #[test]
    fn test_known_provider() {
        let mut s = make_session(20.0, 80.0, 50.0);
        assert!(s.has_known_provider());
        s.provider = UNKNOWN_PROVIDER.to_string();
        assert!(!s.has_known_provider());
    }
}
