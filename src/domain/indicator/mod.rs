//! Technical indicators computed over a [`BarSeries`].
//!
//! All functions address bars by shift (0 = latest closed bar) and fail with
//! [`PhasetraderError::InsufficientHistory`] when the window does not fit.
//! - `atr`: realized ATR, the max/min envelope and the daily/weekly predictions
//! - `pivot`: floor-trader pivot levels

pub mod atr;
pub mod pivot;

use crate::domain::bar_series::BarSeries;
use crate::domain::error::PhasetraderError;

pub(crate) fn insufficient(series: &BarSeries, minimum: usize) -> PhasetraderError {
    PhasetraderError::InsufficientHistory {
        timeframe: series.timeframe(),
        bars: series.len(),
        minimum,
    }
}

/// Simple moving average of closes over `period` bars ending at `shift`.
pub fn sma(series: &BarSeries, period: usize, shift: usize) -> Result<f64, PhasetraderError> {
    if period == 0 || series.len() < period + shift {
        return Err(insufficient(series, period.max(1) + shift));
    }
    let sum: f64 = (shift..shift + period)
        .filter_map(|s| series.shift(s))
        .map(|b| b.close)
        .sum();
    Ok(sum / period as f64)
}

/// True range of the bar at `shift`; the oldest bar in the series has no
/// predecessor and falls back to |high - low|.
pub fn true_range_at(series: &BarSeries, shift: usize) -> Option<f64> {
    let bar = series.shift(shift)?;
    Some(match series.shift(shift + 1) {
        Some(prev) => bar.true_range(prev.close),
        None => bar.range().abs(),
    })
}

/// Highest high of `count` bars ending at `shift`.
pub fn highest_high(
    series: &BarSeries,
    shift: usize,
    count: usize,
) -> Result<f64, PhasetraderError> {
    if count == 0 || series.len() < shift + count {
        return Err(insufficient(series, shift + count.max(1)));
    }
    Ok((shift..shift + count)
        .filter_map(|s| series.shift(s))
        .map(|b| b.high)
        .fold(f64::MIN, f64::max))
}

/// Lowest low of `count` bars ending at `shift`.
pub fn lowest_low(series: &BarSeries, shift: usize, count: usize) -> Result<f64, PhasetraderError> {
    if count == 0 || series.len() < shift + count {
        return Err(insufficient(series, shift + count.max(1)));
    }
    Ok((shift..shift + count)
        .filter_map(|s| series.shift(s))
        .map(|b| b.low)
        .fold(f64::MAX, f64::min))
}
