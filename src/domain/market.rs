//! Per-bar market indicators shared by every strategy.
//!
//! [`MarketIndicators::compute`] never fails: a component without enough
//! history falls back to its neutral value and is logged at debug level.

use chrono::{NaiveDateTime, Timelike};
use tracing::debug;

use crate::domain::bar_series::{Timeframe, TimeframeSet};
use crate::domain::config::EngineConfig;
use crate::domain::error::PhasetraderError;
use crate::domain::indicator::atr::{AtrPrediction, AtrState, predict_daily, predict_weekly};
use crate::domain::indicator::pivot::{PivotLevels, pivot_from_series};
use crate::domain::indicator::{highest_high, lowest_low};
use crate::domain::trend::levels::{SupportResistance, WEEKLY_ATR_FACTOR, select_levels};
use crate::domain::trend::{TrendInputs, TrendPhase, TrendState, classify_timeframe, votes};

/// Shifts over which the ATR envelope is tracked.
const ATR_ENVELOPE_WINDOW: usize = 5;
/// Days and weeks feeding the recent extremes used for level selection.
const RECENT_EXTREME_BARS: usize = 2;
/// Weekly bars spanned by the monthly high/low.
const MONTHLY_WEEKS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketIndicators {
    pub time: Option<NaiveDateTime>,
    /// Latest and previous primary close.
    pub close: f64,
    pub prev_close: f64,

    pub daily_pivot: PivotLevels,
    pub weekly_pivot: PivotLevels,
    pub monthly_pivot: PivotLevels,

    pub daily_atr: AtrState,
    pub weekly_atr: AtrState,
    pub daily_prediction: AtrPrediction,
    pub weekly_prediction: AtrPrediction,

    pub daily_trend: TrendState,
    pub weekly_trend: TrendState,
    pub hourly_ma: i8,
    pub four_hourly_ma: i8,

    pub daily_levels: SupportResistance,
    pub weekly_levels: SupportResistance,
    pub monthly_high: f64,
    pub monthly_low: f64,

    /// Key bar direction among today's primary bars.
    pub key_k: i8,
    pub is_end_of_day: bool,
}

fn soft<T: Default>(what: &str, result: Result<T, PhasetraderError>) -> T {
    result.unwrap_or_else(|err| {
        debug!(indicator = what, "using neutral value: {err}");
        T::default()
    })
}

pub fn is_end_of_day(time: NaiveDateTime) -> bool {
    time.hour() >= 23 && time.minute() >= 30
}

impl MarketIndicators {
    pub fn compute(set: &TimeframeSet, config: &EngineConfig) -> Self {
        let primary = set.get(Timeframe::Primary);
        let daily = set.get(Timeframe::Daily);
        let weekly = set.get(Timeframe::Weekly);

        let time = set.now();
        let close = primary.shift(0).map(|b| b.close).unwrap_or_default();
        let prev_close = primary.shift(1).map(|b| b.close).unwrap_or(close);

        let daily_pivot = soft("daily_pivot", pivot_from_series(daily));
        let weekly_pivot = soft("weekly_pivot", pivot_from_series(weekly));
        let monthly_pivot = soft("monthly_pivot", pivot_from_series(set.get(Timeframe::Monthly)));

        let today = set.current_period(Timeframe::Daily);
        let this_week = set.current_period(Timeframe::Weekly);
        let daily_prediction = soft(
            "daily_prediction",
            predict_daily(daily, today.as_ref(), &daily_pivot),
        );
        let weekly_prediction = soft(
            "weekly_prediction",
            predict_weekly(weekly, this_week.as_ref(), &weekly_pivot),
        );

        let daily_atr = soft(
            "daily_atr",
            AtrState::assemble(
                daily,
                config.atr_period,
                ATR_ENVELOPE_WINDOW,
                config.atr_smoothing,
                (daily_prediction.predicted > 0.0).then_some(&daily_prediction),
            ),
        );
        let weekly_atr = soft(
            "weekly_atr",
            AtrState::assemble(
                weekly,
                config.atr_period,
                ATR_ENVELOPE_WINDOW,
                config.atr_smoothing,
                (weekly_prediction.predicted > 0.0).then_some(&weekly_prediction),
            ),
        );

        let daily_trend = classify_timeframe(&TrendInputs {
            series: daily,
            ma_short: config.daily_ma_short,
            ma_long: config.daily_ma_long,
            atr: daily_atr.realized,
            levels: &daily_pivot,
            prev_close,
            close,
        });
        let weekly_trend = classify_timeframe(&TrendInputs {
            series: weekly,
            ma_short: config.daily_ma_short,
            ma_long: config.daily_ma_long,
            atr: weekly_atr.realized,
            levels: &weekly_pivot,
            prev_close,
            close,
        });

        let intraday_ma = |tf: Timeframe| {
            soft(
                tf.name(),
                votes::ma_vote(
                    set.get(tf),
                    config.intraday_ma_short,
                    config.intraday_ma_long,
                    daily_atr.realized,
                ),
            )
        };
        let hourly_ma = intraday_ma(Timeframe::Hourly);
        let four_hourly_ma = intraday_ma(Timeframe::FourHourly);

        let daily_levels = select_levels(
            close,
            &daily_pivot,
            soft("daily_recent_low", lowest_low(daily, 0, RECENT_EXTREME_BARS)),
            soft("daily_recent_high", highest_high(daily, 0, RECENT_EXTREME_BARS)),
            daily_atr.realized,
        );
        let weekly_levels = select_levels(
            close,
            &weekly_pivot,
            soft("weekly_recent_low", lowest_low(weekly, 0, RECENT_EXTREME_BARS)),
            soft("weekly_recent_high", highest_high(weekly, 0, RECENT_EXTREME_BARS)),
            weekly_atr.realized * WEEKLY_ATR_FACTOR,
        );

        let monthly_high = soft("monthly_high", highest_high(weekly, 0, MONTHLY_WEEKS));
        let monthly_low = soft("monthly_low", lowest_low(weekly, 0, MONTHLY_WEEKS));

        let key_k = match time {
            Some(now) => votes::key_k(
                primary.iter().filter(|b| b.time.date() == now.date()),
                daily_atr.realized,
            ),
            None => 0,
        };

        Self {
            time,
            close,
            prev_close,
            daily_pivot,
            weekly_pivot,
            monthly_pivot,
            daily_atr,
            weekly_atr,
            daily_prediction,
            weekly_prediction,
            daily_trend,
            weekly_trend,
            hourly_ma,
            four_hourly_ma,
            daily_levels,
            weekly_levels,
            monthly_high,
            monthly_low,
            key_k,
            is_end_of_day: time.is_some_and(is_end_of_day),
        }
    }

    pub fn daily_phase(&self) -> TrendPhase {
        self.daily_trend.phase
    }

    pub fn weekly_phase(&self) -> TrendPhase {
        self.weekly_trend.phase
    }
}
