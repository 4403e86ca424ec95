use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{CommandFactory, Parser};
use tracing::debug;

use crate::config::{
    AnalysisConfig, DEFAULT_CLUSTER_RADIUS_KM, DEFAULT_DC_POWER_THRESHOLD_KW, DEFAULT_WORKERS,
};
use crate::error::Result;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Analyse an EV charging-history export
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chargelog",
    about = "Analyse an EV charging-history export",
    version
)]
pub struct Settings {
    /// Charging-history export (JSON array of sessions)
    pub file: PathBuf,

    /// Only analyse sessions starting at or after this date (ISO 8601)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Only analyse sessions starting at or before this date (ISO 8601)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Timezone for date bounds without an offset (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// JSON file with analysis thresholds
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Average grid power (kW) from which a session counts as DC
    #[arg(long, default_value_t = DEFAULT_DC_POWER_THRESHOLD_KW)]
    pub dc_threshold_kw: f64,

    /// Radius (km) within which charging locations are merged
    #[arg(long, default_value_t = DEFAULT_CLUSTER_RADIUS_KM)]
    pub cluster_radius_km: f64,

    /// Parallel aggregate jobs (1-64)
    #[arg(long, default_value_t = DEFAULT_WORKERS, value_parser = clap::value_parser!(u16).range(1..=64).map(usize::from))]
    pub workers: usize,

    /// Report distances in miles
    #[arg(long)]
    pub miles: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and resolve the analysis config.
    pub fn load() -> Result<(Self, AnalysisConfig)> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    ///
    /// Precedence is: flag given on the command line, then the `--config`
    /// file, then built-in defaults.
    pub fn load_from_args(args: Vec<OsString>) -> Result<(Self, AnalysisConfig)> {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        let mut config = match &settings.config {
            Some(path) => {
                debug!("Settings: loading analysis config from {}", path.display());
                AnalysisConfig::load_from(path)?
            }
            None => AnalysisConfig::default(),
        };

        // clap keys the arg id by field name, not by the hyphenated flag.
        if is_arg_explicitly_set(&matches, "dc_threshold_kw") {
            config.dc_power_threshold_kw = settings.dc_threshold_kw;
        }
        if is_arg_explicitly_set(&matches, "cluster_radius_km") {
            config.cluster_radius_km = settings.cluster_radius_km;
        }
        if is_arg_explicitly_set(&matches, "workers") {
            config.workers = settings.workers;
        }
        config.validate()?;

        // Reflect the effective values back so the report shows what ran.
        settings.dc_threshold_kw = config.dc_power_threshold_kw;
        settings.cluster_radius_km = config.cluster_radius_km;
        settings.workers = config.workers;

        if settings.timezone.eq_ignore_ascii_case("auto") {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        Ok((settings, config))
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChargeError;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["chargelog", "history.json"]);

        assert_eq!(settings.file, PathBuf::from("history.json"));
        assert!(settings.start_date.is_none());
        assert!(settings.end_date.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.format, "text");
        assert!(settings.config.is_none());
        assert_eq!(settings.dc_threshold_kw, 12.0);
        assert!((settings.cluster_radius_km - 0.1).abs() < f64::EPSILON);
        assert_eq!(settings.workers, 4);
        assert!(!settings.miles);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_cli_date_bounds() {
        let settings = Settings::parse_from([
            "chargelog",
            "history.json",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-06-30",
        ]);
        assert_eq!(settings.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(settings.end_date.as_deref(), Some("2024-06-30"));
    }

    #[test]
    fn test_settings_rejects_unknown_format() {
        let res = Settings::try_parse_from(["chargelog", "history.json", "--format", "xml"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_settings_rejects_zero_workers() {
        let res = Settings::try_parse_from(["chargelog", "history.json", "--workers", "0"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_load_without_config_uses_defaults() {
        let (settings, config) =
            Settings::load_from_args(args(&["chargelog", "h.json", "--timezone", "UTC"])).unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(settings.timezone, "UTC");
        assert!(!settings.wants_json());
    }

    #[test]
    fn test_load_config_file_beats_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, r#"{"dc_power_threshold_kw": 22.0, "workers": 2}"#).unwrap();

        let (settings, config) = Settings::load_from_args(args(&[
            "chargelog",
            "h.json",
            "--config",
            path.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(config.dc_power_threshold_kw, 22.0);
        assert_eq!(config.workers, 2);
        assert_eq!(settings.dc_threshold_kw, 22.0);
    }

    #[test]
    fn test_load_cli_beats_config_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("thresholds.json");
        std::fs::write(
            &path,
            r#"{"dc_power_threshold_kw": 22.0, "cluster_radius_km": 0.5}"#,
        )
        .unwrap();

        let (_, config) = Settings::load_from_args(args(&[
            "chargelog",
            "h.json",
            "--config",
            path.to_str().unwrap(),
            "--dc-threshold-kw",
            "50",
        ]))
        .unwrap();
        assert_eq!(config.dc_power_threshold_kw, 50.0);
        assert_eq!(config.cluster_radius_km, 0.5);
    }

    #[test]
    fn test_load_invalid_cli_value_fails_validation() {
        let err = Settings::load_from_args(args(&[
            "chargelog",
            "h.json",
            "--cluster-radius-km",
            "0",
        ]))
        .unwrap_err();
        assert!(matches!(err, ChargeError::Config(_)));
    }

    #[test]
    fn test_debug_flag_overrides_log_level() {
        let (settings, _) =
            Settings::load_from_args(args(&["chargelog", "h.json", "--debug"])).unwrap();
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_json_format() {
        let (settings, _) =
            Settings::load_from_args(args(&["chargelog", "h.json", "--format", "json"])).unwrap();
        assert!(settings.wants_json());
    }
}
