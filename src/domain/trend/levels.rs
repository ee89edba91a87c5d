//! Support and resistance selection around the current close.

use crate::domain::indicator::pivot::PivotLevels;

/// Weekly levels are selected against a reduced ATR.
pub const WEEKLY_ATR_FACTOR: f64 = 0.666;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SupportResistance {
    pub support: f64,
    /// `None` when no candidate lies within a valid distance above the close.
    pub resistance: Option<f64>,
}

/// A level is usable when it sits more than half an ATR and at most one and
/// a half ATRs away.
pub fn is_valid_support(distance: f64, atr: f64) -> bool {
    distance > 0.5 * atr && distance <= 1.5 * atr
}

/// Nearest valid support below and resistance above `close`, chosen from
/// the pivot levels and the recent extremes. Support falls back to one ATR
/// below the close.
pub fn select_levels(
    close: f64,
    levels: &PivotLevels,
    recent_low: f64,
    recent_high: f64,
    atr: f64,
) -> SupportResistance {
    let support = [levels.s1, levels.s2, levels.s3, recent_low]
        .into_iter()
        .filter(|&s| s < close && is_valid_support(close - s, atr))
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
        .unwrap_or(close - atr);

    let resistance = [levels.r1, levels.r2, levels.r3, recent_high]
        .into_iter()
        .filter(|&r| r > close && is_valid_support(r - close, atr))
        .fold(None, |best: Option<f64>, r| Some(best.map_or(r, |b| b.min(r))));

    SupportResistance {
        support,
        resistance,
    }
}
