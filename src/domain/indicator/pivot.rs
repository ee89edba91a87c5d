//! Classic floor-trader pivot levels.

use crate::domain::bar_series::BarSeries;
use crate::domain::error::PhasetraderError;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PivotLevels {
    pub pivot: f64,
    pub s1: f64,
    pub r1: f64,
    pub s2: f64,
    pub r2: f64,
    pub s3: f64,
    pub r3: f64,
}

/// Levels from a prior period's high, low and close.
pub fn compute_pivot(high: f64, low: f64, close: f64) -> PivotLevels {
    let pivot = (high + low + close) / 3.0;
    PivotLevels {
        pivot,
        r1: 2.0 * pivot - low,
        s1: 2.0 * pivot - high,
        r2: pivot + (high - low),
        s2: pivot - (high - low),
        r3: high + 2.0 * (pivot - low),
        s3: low - 2.0 * (high - pivot),
    }
}

/// Levels for the current period, taken from the latest closed bar.
pub fn pivot_from_series(series: &BarSeries) -> Result<PivotLevels, PhasetraderError> {
    let prior = series
        .latest()
        .ok_or(PhasetraderError::InsufficientHistory {
            timeframe: series.timeframe(),
            bars: 0,
            minimum: 1,
        })?;
    Ok(compute_pivot(prior.high, prior.low, prior.close))
}
