//! Realized and predicted Average True Range.

use crate::domain::bar_series::BarSeries;
use crate::domain::error::PhasetraderError;
use crate::domain::indicator::pivot::PivotLevels;
use crate::domain::indicator::{insufficient, true_range_at};
use crate::domain::ohlcv::Bar;

/// How true ranges are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtrSmoothing {
    #[default]
    Simple,
    /// Wilder smoothing seeded with the simple average of the oldest window.
    Wilder,
}

impl AtrSmoothing {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "simple" | "sma" => Some(AtrSmoothing::Simple),
            "wilder" => Some(AtrSmoothing::Wilder),
            _ => None,
        }
    }
}

/// Realized volatility against the prediction for the open period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolatilityTrend {
    #[default]
    InRange,
    BreakUp,
    BreakDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AtrState {
    pub realized: f64,
    pub predicted: f64,
    pub max: f64,
    pub min: f64,
}

/// Projection of the open period's range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AtrPrediction {
    /// Forward estimate of the period's ATR, raised to the open period's
    /// range once that range has broken out.
    pub predicted: f64,
    pub min_envelope: f64,
    pub max_envelope: f64,
    pub trend: VolatilityTrend,
    pub projected_high: f64,
    pub projected_low: f64,
    pub max_high: f64,
    pub max_low: f64,
}

/// Average true range of the `period` bars ending at `shift`.
pub fn realized_atr(
    series: &BarSeries,
    period: usize,
    shift: usize,
    smoothing: AtrSmoothing,
) -> Result<f64, PhasetraderError> {
    if period == 0 || series.len() < shift + period {
        return Err(insufficient(series, shift + period.max(1)));
    }

    match smoothing {
        AtrSmoothing::Simple => {
            let sum: f64 = (shift..shift + period)
                .filter_map(|s| true_range_at(series, s))
                .sum();
            Ok(sum / period as f64)
        }
        AtrSmoothing::Wilder => {
            let tr_values: Vec<f64> = (shift..series.len())
                .rev()
                .filter_map(|s| true_range_at(series, s))
                .collect();
            let seed = tr_values[..period].iter().sum::<f64>() / period as f64;
            Ok(tr_values[period..]
                .iter()
                .fold(seed, |atr, tr| (atr * (period - 1) as f64 + tr) / period as f64))
        }
    }
}

/// Running maximum of realized ATR over shifts `0..window`.
pub fn max_atr(
    series: &BarSeries,
    period: usize,
    window: usize,
    smoothing: AtrSmoothing,
) -> Result<f64, PhasetraderError> {
    let latest = realized_atr(series, period, 0, smoothing)?;
    Ok((1..window)
        .filter_map(|s| realized_atr(series, period, s, smoothing).ok())
        .fold(latest, f64::max))
}

/// Running minimum of realized ATR over shifts `0..window`.
pub fn min_atr(
    series: &BarSeries,
    period: usize,
    window: usize,
    smoothing: AtrSmoothing,
) -> Result<f64, PhasetraderError> {
    let latest = realized_atr(series, period, 0, smoothing)?;
    Ok((1..window)
        .filter_map(|s| realized_atr(series, period, s, smoothing).ok())
        .fold(latest, f64::min))
}

struct Profile {
    periods: [usize; 3],
    floor: f64,
    same_period_shifts: &'static [usize],
}

const DAILY: Profile = Profile {
    periods: [2, 5, 20],
    floor: 0.5,
    same_period_shifts: &[4, 9, 14, 19],
};

const WEEKLY: Profile = Profile {
    periods: [2, 4, 8],
    floor: 0.6,
    same_period_shifts: &[3, 7],
};

const CEILING: f64 = 1.3;
const MIN_WEIGHT_THRESHOLD: f64 = 0.7;

struct Core {
    predicted: f64,
    min_envelope: f64,
    max_envelope: f64,
    clamped_max: f64,
}

fn predict_core(series: &BarSeries, profile: &Profile) -> Result<Core, PhasetraderError> {
    let longest = profile.periods[2];
    let needed = profile
        .same_period_shifts
        .iter()
        .map(|s| s + 1)
        .max()
        .unwrap_or(0)
        .max(longest);
    series.require(needed)?;

    let mut min_envelope = f64::MAX;
    let mut max_envelope = f64::MIN;
    for period in profile.periods {
        let atr = realized_atr(series, period, 0, AtrSmoothing::Simple)?;
        min_envelope = min_envelope.min(atr);
        max_envelope = max_envelope.max(atr);
    }

    // Window of the medium ATR minus its already-closed members leaves the
    // range still available to the open period.
    let medium = profile.periods[1];
    let closed: f64 = (0..medium - 1)
        .filter_map(|s| true_range_at(series, s))
        .sum();
    let clamp = |v: f64| v.max(min_envelope * profile.floor).min(min_envelope * CEILING);
    let clamped_min = clamp(min_envelope * medium as f64 - closed);
    let clamped_max = clamp(max_envelope * medium as f64 - closed);

    let mut predicted = if clamped_min > min_envelope * MIN_WEIGHT_THRESHOLD {
        clamped_min
    } else {
        (clamped_min + clamped_max) / 2.0
    };

    let same_period = profile
        .same_period_shifts
        .iter()
        .filter_map(|&s| true_range_at(series, s))
        .sum::<f64>()
        / profile.same_period_shifts.len() as f64;
    predicted = predicted.min(min_envelope).min(same_period);

    Ok(Core {
        predicted,
        min_envelope,
        max_envelope,
        clamped_max,
    })
}

/// Split the open period against the prediction.
fn breakout(
    prediction: &mut AtrPrediction,
    last_close: f64,
    current: Option<&Bar>,
) {
    let Some(current) = current else {
        return;
    };
    let realized = current.true_range(last_close);
    if realized > prediction.predicted {
        prediction.predicted = realized;
        prediction.projected_high = current.high;
        prediction.projected_low = current.low;
        prediction.trend = if current.close > last_close {
            VolatilityTrend::BreakUp
        } else {
            VolatilityTrend::BreakDown
        };
    }
}

/// Project today's ATR and range from closed daily bars, the open day
/// (if any primary bars exist for it) and today's daily pivot levels.
pub fn predict_daily(
    daily: &BarSeries,
    today: Option<&Bar>,
    levels: &PivotLevels,
) -> Result<AtrPrediction, PhasetraderError> {
    let core = predict_core(daily, &DAILY)?;
    let last_close = daily.latest().map(|b| b.close).unwrap_or_default();
    let (intraday_high, intraday_low) = today
        .map(|b| (b.high, b.low))
        .unwrap_or((last_close, last_close));

    let mut prediction = AtrPrediction {
        predicted: core.predicted,
        min_envelope: core.min_envelope,
        max_envelope: core.max_envelope,
        trend: VolatilityTrend::InRange,
        projected_low: (last_close.max(intraday_high) - core.clamped_max).max(levels.s2),
        projected_high: (last_close.min(intraday_low) + core.clamped_max).min(levels.r2),
        max_high: 0.0,
        max_low: 0.0,
    };
    breakout(&mut prediction, last_close, today);

    prediction.max_low = if prediction.projected_low > levels.s2 {
        levels.s2
    } else {
        last_close.max(intraday_high) - core.predicted
    };
    prediction.max_high = if prediction.projected_high < levels.r2 {
        levels.r2
    } else {
        last_close.min(intraday_low) + core.predicted
    };
    Ok(prediction)
}

/// Weekly counterpart of [`predict_daily`].
pub fn predict_weekly(
    weekly: &BarSeries,
    this_week: Option<&Bar>,
    levels: &PivotLevels,
) -> Result<AtrPrediction, PhasetraderError> {
    let core = predict_core(weekly, &WEEKLY)?;
    let last_close = weekly.latest().map(|b| b.close).unwrap_or_default();
    let (intra_high, intra_low) = this_week
        .map(|b| (b.high, b.low))
        .unwrap_or((last_close, last_close));

    let mut prediction = AtrPrediction {
        predicted: core.predicted,
        min_envelope: core.min_envelope,
        max_envelope: core.max_envelope,
        trend: VolatilityTrend::InRange,
        projected_low: (last_close.max(intra_high) - core.predicted).max(levels.s2),
        projected_high: (last_close.min(intra_low) + core.predicted).min(levels.r2),
        max_high: 0.0,
        max_low: 0.0,
    };
    breakout(&mut prediction, last_close, this_week);

    prediction.max_low = prediction.projected_low.min(levels.s2);
    prediction.max_high = prediction.projected_high.max(levels.r2);
    Ok(prediction)
}

impl AtrState {
    /// Combine the realized ATR with a prediction; `max` never falls below
    /// `realized` or `predicted`.
    pub fn assemble(
        series: &BarSeries,
        period: usize,
        window: usize,
        smoothing: AtrSmoothing,
        prediction: Option<&AtrPrediction>,
    ) -> Result<Self, PhasetraderError> {
        let realized = realized_atr(series, period, 0, smoothing)?;
        let running_max = max_atr(series, period, window, smoothing)?;
        let running_min = min_atr(series, period, window, smoothing)?;
        let (predicted, envelope_max, envelope_min) = match prediction {
            Some(p) => (p.predicted, p.max_envelope, p.min_envelope),
            None => (realized, realized, realized),
        };
        Ok(AtrState {
            realized,
            predicted,
            max: running_max.max(envelope_max).max(predicted).max(realized),
            min: running_min.min(envelope_min),
        })
    }
}
