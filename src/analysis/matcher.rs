//! Range lookup in instrument specifications

use serde::Serialize;

use crate::core::units::UnitSystem;
use crate::entities::{Instrument, ToleranceComponent, ToleranceSpec};

/// A range whose limits contain the looked-up value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeMatch {
    /// Name of the instrument function the range belongs to
    pub function: String,
    pub tolerance: ToleranceSpec,
    pub range_min: f64,
    pub range_max: f64,
    pub range_unit: String,
    pub resolution: Option<f64>,
    /// `min-max unit`, for display
    pub range_info: String,
}

/// Every range of every same-quantity function containing `|value|`
///
/// The value is converted into each function's unit first, so `5000 mV`
/// and `5 V` select the same ranges. Unknown units match nothing.
pub fn find_matching_tolerances(instrument: &Instrument, value: f64, unit: &str) -> Vec<RangeMatch> {
    let Some(input) = UnitSystem::lookup(unit) else {
        return Vec::new();
    };
    if !value.is_finite() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for function in &instrument.functions {
        let Some(func_unit) = UnitSystem::lookup(&function.unit) else {
            continue;
        };
        if func_unit.quantity != input.quantity {
            continue;
        }

        let magnitude = (value * input.to_si / func_unit.to_si).abs();
        for range in function.ranges.iter().filter(|r| r.contains(magnitude)) {
            let min = range.min.unwrap_or(0.0);
            let max = range.max.unwrap_or(0.0);
            matches.push(RangeMatch {
                function: function.name.clone(),
                tolerance: range.tolerances.clone(),
                range_min: min,
                range_max: max,
                range_unit: function.unit.clone(),
                resolution: range.resolution,
                range_info: format!("{}-{} {}", min, max, function.unit),
            });
        }
    }
    matches
}

/// Tightest matching range: the one with the smallest maximum
pub fn find_instrument_tolerance(instrument: &Instrument, value: f64, unit: &str) -> Option<RangeMatch> {
    find_matching_tolerances(instrument, value, unit)
        .into_iter()
        .min_by(|a, b| a.range_max.total_cmp(&b.range_max))
}

/// Clean tolerance for `value unit` from `chosen`, or from the tightest match
///
/// Missing units default to `%` for reading and range terms and to `unit`
/// for floor and readings (IV) terms. Every term with a `high` becomes
/// symmetric, and the range term's full scale is the range maximum.
pub fn recalculate_tolerance(
    instrument: &Instrument,
    value: f64,
    unit: &str,
    chosen: Option<&RangeMatch>,
) -> Option<ToleranceSpec> {
    let best;
    let matched = match chosen {
        Some(m) => m,
        None => {
            best = find_instrument_tolerance(instrument, value, unit)?;
            &best
        }
    };

    let full_scale = if matched.range_max != 0.0 {
        matched.range_max
    } else {
        value
    };

    let mut spec = matched.tolerance.clone();
    let normalize = |comp: &mut Option<ToleranceComponent>, default_unit: &str, full_scale: Option<f64>| {
        let Some(comp) = comp.as_mut() else {
            return;
        };
        if comp.unit.trim().is_empty() {
            comp.unit = default_unit.to_string();
        }
        if let Some(fs) = full_scale {
            comp.value = Some(fs);
        }
        if let Some(high) = comp.high {
            comp.low = Some(-high.abs());
            comp.symmetric = true;
        }
    };

    normalize(&mut spec.reading, "%", None);
    normalize(&mut spec.range, "%", Some(full_scale));
    normalize(&mut spec.floor, unit, None);
    normalize(&mut spec.readings_iv, unit, None);
    if let Some(db) = spec.db.as_mut() {
        if let Some(high) = db.high {
            db.low = Some(-high.abs());
            db.symmetric = true;
        }
    }
    spec.measuring_resolution = matched.resolution;

    Some(spec)
}
