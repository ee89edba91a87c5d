//! Intraday key bar entries in the direction of the daily trend.

use crate::domain::bar_series::Timeframe;
use crate::domain::context::StrategyContext;
use crate::domain::dispatch::{Strategy, exit_against};
use crate::domain::position::Side;
use crate::domain::signals::{Signals, SplitPlan};
use crate::domain::trend::votes;

pub const MODE: u32 = 9;

/// Risk multiplier when the key bar's stop sits close to the day's extreme.
const FULL_RISK: f64 = 2.0;
const REDUCED_RISK: f64 = 1.0;

pub struct KeyKReversal;

impl Strategy for KeyKReversal {
    fn name(&self) -> &str {
        "key_k_reversal"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let market = ctx.market;
        let Some(side) = Side::from_signal(market.daily_phase().direction()) else {
            return Signals::default();
        };
        let mut signals = Signals {
            execution_trend: side.sign(),
            exit_signal: exit_against(side),
            ..Signals::default()
        };

        let atr = market.daily_atr.realized;
        let today = ctx.now.date();
        let Some((key, direction)) = votes::key_bar(
            ctx.bars
                .get(Timeframe::Primary)
                .iter()
                .filter(|b| b.time.date() == today),
            atr,
        ) else {
            return signals;
        };
        if direction != side.sign() {
            signals.status = "key bar against the daily trend".to_string();
            return signals;
        }
        if ctx.open_on(side).any(|p| p.open_time >= key.time) {
            return signals;
        }

        let entry = ctx.market_price(side);
        let stop = match side {
            Side::Buy => key.low,
            Side::Sell => key.high,
        };
        let stop_distance = (entry - stop).abs();
        if stop_distance <= 0.0 || (entry - stop) * f64::from(side.sign()) <= 0.0 {
            return signals;
        }

        let day_extreme = ctx.today().map(|bar| match side {
            Side::Buy => bar.low,
            Side::Sell => bar.high,
        });
        let far_from_extreme = day_extreme.is_some_and(|extreme| (stop - extreme).abs() >= 0.5 * atr);

        signals.entry_signal = side.sign();
        signals.entry_price = entry;
        signals.stop_loss_price = stop;
        signals.risk = if far_from_extreme { REDUCED_RISK } else { FULL_RISK };
        signals.split = SplitPlan::Partials {
            take_distances: vec![stop_distance, 2.0 * stop_distance, 0.0],
        };
        signals.status = format!("key bar at {}", key.time);
        signals
    }
}
