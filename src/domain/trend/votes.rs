//! Individual trend votes over one timeframe.

use crate::domain::bar_series::BarSeries;
use crate::domain::error::PhasetraderError;
use crate::domain::indicator::{highest_high, insufficient, lowest_low, sma};
use crate::domain::ohlcv::Bar;

pub const THREE_RULES_UP: i8 = 3;
pub const THREE_RULES_DOWN: i8 = -3;

/// Higher high and higher close than the bar before → +1, lower low and
/// lower close → -1.
pub fn high_low_vote(series: &BarSeries, shift: usize) -> Result<i8, PhasetraderError> {
    let (Some(bar), Some(prev)) = (series.shift(shift), series.shift(shift + 1)) else {
        return Err(insufficient(series, shift + 2));
    };
    Ok(if bar.high > prev.high && bar.close > prev.close {
        1
    } else if bar.low < prev.low && bar.close < prev.close {
        -1
    } else {
        0
    })
}

/// Close at `shift` breaking out of the box formed by the two bars before it.
pub fn three_rules_vote(series: &BarSeries, shift: usize) -> Result<i8, PhasetraderError> {
    let close = series
        .shift(shift)
        .ok_or_else(|| insufficient(series, shift + 3))?
        .close;
    let box_high = highest_high(series, shift + 1, 2)?;
    let box_low = lowest_low(series, shift + 1, 2)?;
    Ok(if close > box_high {
        THREE_RULES_UP
    } else if close < box_low {
        THREE_RULES_DOWN
    } else {
        0
    })
}

/// Three-rules vote that looks back up to two bars when the latest bar
/// shows structure but no breakout.
pub fn three_rules_with_fallback(
    series: &BarSeries,
    high_low: i8,
) -> Result<i8, PhasetraderError> {
    let vote = three_rules_vote(series, 0)?;
    if vote != 0 || high_low == 0 {
        return Ok(vote);
    }
    for shift in 1..=2 {
        let earlier = three_rules_vote(series, shift)?;
        if earlier != 0 {
            return Ok(if earlier.signum() == high_low.signum() {
                earlier
            } else {
                0
            });
        }
    }
    Ok(0)
}

/// Short against long SMA: a gap of at least `atr` → ±2, any gap → ±1.
pub fn ma_vote(
    series: &BarSeries,
    short: usize,
    long: usize,
    atr: f64,
) -> Result<i8, PhasetraderError> {
    let gap = sma(series, short, 0)? - sma(series, long, 0)?;
    let direction: i8 = if gap > 0.0 {
        1
    } else if gap < 0.0 {
        -1
    } else {
        0
    };
    Ok(if atr > 0.0 && gap.abs() >= atr {
        2 * direction
    } else {
        direction
    })
}

/// Intraday key bar: a bar at least half a daily ATR wide that closes in
/// the top third (+1) or bottom third (-1) of its range. The latest
/// qualifying bar decides.
pub fn key_bar<'a>(
    bars: impl DoubleEndedIterator<Item = &'a Bar>,
    daily_atr: f64,
) -> Option<(&'a Bar, i8)> {
    if daily_atr <= 0.0 {
        return None;
    }
    bars.rev().find_map(|bar| {
        let range = bar.range();
        if range < 0.5 * daily_atr {
            None
        } else if bar.high - bar.close <= range / 3.0 {
            Some((bar, 1))
        } else if bar.close - bar.low <= range / 3.0 {
            Some((bar, -1))
        } else {
            None
        }
    })
}

pub fn key_k<'a>(bars: impl DoubleEndedIterator<Item = &'a Bar>, daily_atr: f64) -> i8 {
    key_bar(bars, daily_atr).map_or(0, |(_, direction)| direction)
}
