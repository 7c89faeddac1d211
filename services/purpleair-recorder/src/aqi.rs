//! PM2.5 to US EPA Air Quality Index conversion.

/// Returned when no AQI can be derived from the sample.
pub const NOT_COMPUTABLE: i64 = -1;

/// Concentrations above this are treated as sensor faults.
const MAX_PM25: f64 = 1000.0;

/// `(lower_exclusive, aqi_high, aqi_low, bp_high, bp_low)`, highest bracket first.
const BRACKETS: [(f64, f64, f64, f64, f64); 6] = [
    (350.5, 500.0, 401.0, 500.0, 350.5),
    (250.5, 400.0, 301.0, 350.4, 250.5),
    (150.5, 300.0, 201.0, 250.4, 150.5),
    (55.5, 200.0, 151.0, 150.4, 55.5),
    (35.5, 150.0, 101.0, 55.4, 35.5),
    (12.1, 100.0, 51.0, 35.4, 12.1),
];

/// Bottom bracket, inclusive of zero.
const BASE_BRACKET: (f64, f64, f64, f64) = (50.0, 0.0, 12.0, 0.0);

fn interpolate(pm25: f64, aqi_high: f64, aqi_low: f64, bp_high: f64, bp_low: f64) -> i64 {
    ((aqi_high - aqi_low) / (bp_high - bp_low) * (pm25 - bp_low) + aqi_low).round() as i64
}

/// Convert a PM2.5 concentration (µg/m³) into an AQI value.
///
/// Brackets are matched with strict `>` against their lower edge, so a value
/// sitting exactly on an edge (e.g. `35.5`) falls into the lower bracket.
/// Negative inputs are passed through truncated rather than converted, and
/// missing, `NaN` or implausibly large inputs yield [`NOT_COMPUTABLE`].
#[must_use]
pub fn aqi_from_pm(pm25: Option<f64>) -> i64 {
    let Some(pm25) = pm25 else {
        return NOT_COMPUTABLE;
    };
    if pm25.is_nan() || pm25 > MAX_PM25 {
        return NOT_COMPUTABLE;
    }
    if pm25 < 0.0 {
        return pm25.trunc() as i64;
    }
    for (edge, aqi_high, aqi_low, bp_high, bp_low) in BRACKETS {
        if pm25 > edge {
            return interpolate(pm25, aqi_high, aqi_low, bp_high, bp_low);
        }
    }
    let (aqi_high, aqi_low, bp_high, bp_low) = BASE_BRACKET;
    if pm25 >= 0.0 {
        return interpolate(pm25, aqi_high, aqi_low, bp_high, bp_low);
    }
    NOT_COMPUTABLE
}

/// Value of the `aqi` series for a sample, `None` when nothing is emitted.
///
/// Negative samples are written unchanged, so a raw `-1.0` is not mistaken
/// for [`NOT_COMPUTABLE`].
#[must_use]
pub fn aqi_point_value(pm25: Option<f64>) -> Option<f64> {
    match pm25 {
        Some(raw) if raw < 0.0 => Some(raw),
        sample => match aqi_from_pm(sample) {
            NOT_COMPUTABLE => None,
            aqi => Some(aqi as f64),
        },
    }
}
