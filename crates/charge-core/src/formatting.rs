//! Number, energy and distance helpers for the text report.

/// Kilometres to statute miles.
pub const KM_TO_MILES: f64 = 0.621371;

/// Group the integer part with commas and keep `decimals` fractional digits.
///
/// ```
/// use charge_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.54, 2), "-9,876.54");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 1);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    // "-0.00" reads badly; only keep the sign when something non-zero survives.
    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// `"1,234.5 kWh"`
pub fn format_energy(kwh: f64) -> String {
    format!("{} kWh", format_number(kwh, 1))
}

/// Euro amount with two decimals.
///
/// ```
/// use charge_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.5), "€1,234.50");
/// assert_eq!(format_currency(-3.0), "-€3.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    let text = format_number(amount, 2);
    match text.strip_prefix('-') {
        Some(abs) => format!("-€{abs}"),
        None => format!("€{text}"),
    }
}

/// Minutes as `"45m"`, `"2h"` or `"2h 5m"`.
pub fn format_duration(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as i64;
    match (total / 60, total % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// `part / whole * 100` rounded to `decimals`; 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64, decimals: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let factor = 10_f64.powi(decimals as i32);
    (part / whole * 100.0 * factor).round() / factor
}

pub fn km_to_miles(km: f64) -> f64 {
    km * KM_TO_MILES
}

/// Distance in the requested unit, e.g. `"12,345 km"` or `"7,671 mi"`.
pub fn format_distance(km: f64, miles: bool) -> String {
    if miles {
        format!("{} mi", format_number(km_to_miles(km), 0))
    } else {
        format!("{} km", format_number(km, 0))
    }
}
