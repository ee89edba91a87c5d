//! Weekly phase trend with entries on execution bars straddling the weekly
//! pivot.

use crate::domain::bar_series::Timeframe;
use crate::domain::context::StrategyContext;
use crate::domain::dispatch::{
    ENTRY_HOURS, Strategy, beyond, exit_against, first_level, protective_stop, second_level,
};
use crate::domain::position::Side;
use crate::domain::signals::{Signals, SplitPlan};
use crate::domain::trend::TrendPhase;

pub const MODE: u32 = 10;

pub struct WeeklyPivot;

impl Strategy for WeeklyPivot {
    fn name(&self) -> &str {
        "weekly_pivot"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let market = ctx.market;
        let phase = market.weekly_phase();
        let mut signals = Signals {
            status: format!("weekly {phase}"),
            ..Signals::default()
        };
        let Some(side) = Side::from_signal(phase.direction()) else {
            return signals;
        };
        signals.execution_trend = side.sign();
        signals.exit_signal = exit_against(side);

        if !matches!(
            phase,
            TrendPhase::BeginningUp
                | TrendPhase::MiddleUp
                | TrendPhase::BeginningDown
                | TrendPhase::MiddleDown
        ) {
            return signals;
        }

        let adjust = ctx.adjust();
        let atr = market.weekly_atr.realized;
        let entry = ctx.market_price(side);
        let stop = protective_stop(&market.weekly_levels, side, entry, atr);
        signals.entry_price = entry;
        signals.stop_loss_price = stop;

        let direction = f64::from(side.sign());
        if !beyond(side, entry, stop + direction * adjust) {
            return signals;
        }

        let pivot = market.weekly_pivot.pivot;
        let straddles = ctx.bar(Timeframe::Secondary, 0).is_some_and(|bar| match side {
            Side::Buy => bar.low < pivot && pivot < bar.close,
            Side::Sell => bar.high > pivot && pivot > bar.close,
        });
        if !straddles || !ENTRY_HOURS.contains(&ctx.hour()) {
            return signals;
        }
        if ctx.has_entry_near(side, entry, atr / 3.0, ctx.start_of_week()) {
            signals.status = format!("weekly {phase}: already entered this week");
            return signals;
        }
        // Only while the first weekly level is still ahead.
        if beyond(side, entry, first_level(&market.weekly_pivot, side)) {
            return signals;
        }

        let target = second_level(&market.weekly_pivot, side) - direction * adjust;
        signals.take_profit_price = target;
        signals.entry_signal = side.sign();
        signals.split = SplitPlan::Partials {
            take_distances: vec![(target - entry).abs()],
        };
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::test_support::{Fixture, at, position};
    use crate::domain::indicator::pivot::compute_pivot;
    use crate::domain::ohlcv::Bar;
    use crate::domain::signals::ExitSignal;
    use crate::domain::trend::levels::SupportResistance;

    fn fixture(phase: TrendPhase, bar: (f64, f64, f64)) -> Fixture {
        let mut f = Fixture::new(at(6, 10, 0), 100.5);
        f.market.weekly_trend.phase = phase;
        // pivot 100, R1 103, S1 97, R2 106, S2 94
        f.market.weekly_pivot = compute_pivot(103.0, 97.0, 100.0);
        f.market.weekly_atr.realized = 4.0;
        f.market.weekly_levels = SupportResistance {
            support: 97.0,
            resistance: Some(103.0),
        };
        let (high, low, close) = bar;
        f.bars
            .push(
                Timeframe::Secondary,
                Bar {
                    time: at(6, 9, 45),
                    open: close,
                    high,
                    low,
                    close,
                    volume: 1.0,
                },
            )
            .unwrap();
        f
    }

    #[test]
    fn buy_on_straddle_with_target_at_r2() {
        let f = fixture(TrendPhase::MiddleUp, (100.6, 99.8, 100.4));
        let s = WeeklyPivot.evaluate(&f.ctx());
        assert_eq!(s.entry_signal, 1);
        assert_eq!(s.exit_signal, ExitSignal::ExitSell);
        // min(support 97, entry - ATR 96.5)
        assert!((s.stop_loss_price - 96.5).abs() < 1e-9);
        assert!((s.take_profit_price - 106.0).abs() < 1e-9);
        assert_eq!(
            s.split,
            SplitPlan::Partials {
                take_distances: vec![5.5]
            }
        );
    }

    #[test]
    fn sell_mirrors() {
        let mut f = fixture(TrendPhase::BeginningDown, (100.2, 99.4, 99.6));
        f.bid = 99.5;
        let s = WeeklyPivot.evaluate(&f.ctx());
        assert_eq!(s.entry_signal, -1);
        assert_eq!(s.exit_signal, ExitSignal::ExitBuy);
        assert!((s.stop_loss_price - 103.5).abs() < 1e-9);
        assert!((s.take_profit_price - 94.0).abs() < 1e-9);
    }

    #[test]
    fn no_entry_without_straddle() {
        let f = fixture(TrendPhase::MiddleUp, (101.0, 100.2, 100.8));
        let s = WeeklyPivot.evaluate(&f.ctx());
        assert_eq!(s.entry_signal, 0);
        assert_eq!(s.execution_trend, 1);
    }

    #[test]
    fn no_entry_beyond_r1() {
        let mut f = fixture(TrendPhase::MiddleUp, (100.6, 99.8, 100.4));
        f.ask = 103.5;
        assert_eq!(WeeklyPivot.evaluate(&f.ctx()).entry_signal, 0);
    }

    #[test]
    fn one_entry_per_price_per_week() {
        let mut f = fixture(TrendPhase::MiddleUp, (100.6, 99.8, 100.4));
        // Monday of the same week
        f.positions.push(position(1, Side::Buy, at(4, 12, 0), 100.0));
        assert_eq!(WeeklyPivot.evaluate(&f.ctx()).entry_signal, 0);
    }

    #[test]
    fn range_week_is_flat() {
        let f = fixture(TrendPhase::Range, (100.6, 99.8, 100.4));
        let s = WeeklyPivot.evaluate(&f.ctx());
        assert_eq!(s.execution_trend, 0);
        assert_eq!(s.exit_signal, ExitSignal::None);
    }
}
