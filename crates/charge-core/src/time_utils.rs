use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ChargeError, Result};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── Epoch conversion ──────────────────────────────────────────────────────────

/// Convert vendor epoch seconds (integer or fractional) into a UTC instant.
///
/// Returns `None` for non-finite or out-of-range values.
pub fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    // Floor keeps the sub-second part non-negative for pre-1970 instants.
    let whole = seconds.floor();
    let mut secs = whole as i64;
    let mut nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos = 0;
    }
    DateTime::from_timestamp(secs, nanos)
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Interprets user-supplied ISO-8601 strings in a configured timezone.
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name as the default.
    ///
    /// `"auto"` resolves to the system timezone. Unrecognised names fall back
    /// to UTC with a warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = if tz_name.eq_ignore_ascii_case("auto") {
            get_system_timezone()
        } else {
            tz_name.to_string()
        };
        let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                resolved
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Parse an ISO-8601 date or date-time into a UTC instant.
    ///
    /// * RFC 3339 with `Z` or an offset is taken as is.
    /// * Naive date-times are local to the handler's timezone.
    /// * A bare `YYYY-MM-DD` means local midnight of that day.
    pub fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ChargeError::TimestampParse(s.to_string()));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        let naive = FMTS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(|| ChargeError::TimestampParse(s.to_string()))?;

        // DST gaps have no local instant; ambiguous times take the earlier one.
        self.default_tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ChargeError::TimestampParse(s.to_string()))
    }

    /// Convert a UTC instant to the handler's timezone for display.
    pub fn to_local(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.default_tz)
    }

    /// Expose the configured default timezone.
    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive `[start, end]` window over session start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(ChargeError::InvalidDateRange(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse optional ISO-8601 bounds.
    ///
    /// The range is only active when both bounds are present; a lone bound is
    /// ignored with a warning and yields `Ok(None)`.
    pub fn from_bounds(
        start: Option<&str>,
        end: Option<&str>,
        handler: &TimezoneHandler,
    ) -> Result<Option<Self>> {
        match (start, end) {
            (Some(s), Some(e)) => {
                let start = handler.parse_timestamp(s)?;
                let end = handler.parse_timestamp(e)?;
                Self::new(start, end).map(Some)
            }
            (None, None) => Ok(None),
            (Some(only), None) | (None, Some(only)) => {
                warn!(
                    "DateRange: ignoring lone bound \"{}\"; both start and end are required",
                    only
                );
                Ok(None)
            }
        }
    }

    /// `true` when `ts` lies inside the window (both ends inclusive).
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}
