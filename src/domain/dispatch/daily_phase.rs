//! Daily phase trend following with pullback entries at the daily pivot.

use crate::domain::bar_series::Timeframe;
use crate::domain::context::StrategyContext;
use crate::domain::dispatch::{
    ENTRY_HOURS, Strategy, beyond, exit_against, protective_stop, second_level,
};
use crate::domain::position::Side;
use crate::domain::signals::{ExitSignal, Signals, SplitPlan};
use crate::domain::trend::TrendPhase;

pub const MODE: u32 = 0;

pub struct DailyPhaseTrend;

/// Take-profit distances for a medium-term entry: one stop, twice the stop
/// capped at the outer level, and a runner.
pub(crate) fn medium_term_targets(stop_distance: f64, to_outer_level: f64) -> Vec<f64> {
    let second = if to_outer_level > 0.0 {
        (2.0 * stop_distance).min(to_outer_level)
    } else {
        2.0 * stop_distance
    };
    vec![stop_distance, second, 0.0]
}

impl Strategy for DailyPhaseTrend {
    fn name(&self) -> &str {
        "daily_phase_trend"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let market = ctx.market;
        let phase = market.daily_phase();
        let mut signals = Signals {
            status: phase.to_string(),
            ..Signals::default()
        };

        let Some(side) = Side::from_signal(phase.direction()) else {
            signals.exit_signal = ExitSignal::ExitAll;
            return signals;
        };
        signals.execution_trend = side.sign();
        signals.exit_signal = exit_against(side);

        let tradeable = matches!(
            phase,
            TrendPhase::BeginningUp
                | TrendPhase::MiddleUp
                | TrendPhase::BeginningDown
                | TrendPhase::MiddleDown
        );
        if !tradeable {
            return signals;
        }

        let adjust = ctx.adjust();
        let entry = ctx.market_price(side);
        let stop = protective_stop(&market.daily_levels, side, entry, market.daily_atr.realized);
        signals.entry_price = entry;
        signals.stop_loss_price = stop;

        let level = match side {
            Side::Buy => stop + adjust,
            Side::Sell => stop - adjust,
        };
        if !beyond(side, entry, level) {
            return signals;
        }

        let pivot = market.daily_pivot.pivot;
        let pulled_back = ctx.bar(Timeframe::Secondary, 0).is_some_and(|bar| match side {
            Side::Buy => bar.low < pivot && pivot < bar.close,
            Side::Sell => bar.high > pivot && pivot > bar.close,
        });
        if !pulled_back || !ENTRY_HOURS.contains(&ctx.hour()) {
            return signals;
        }

        let tolerance = market.daily_atr.max / 3.0;
        if ctx.has_entry_near(side, entry, tolerance, ctx.start_of_day()) {
            signals.status = format!("{phase}: already entered near {entry}");
            return signals;
        }

        if matches!(phase, TrendPhase::BeginningUp | TrendPhase::BeginningDown) {
            let broken = ctx.today().is_some_and(|today| match side {
                Side::Buy => today.low < market.daily_levels.support - adjust,
                Side::Sell => market
                    .daily_levels
                    .resistance
                    .is_some_and(|r| today.high > r + adjust),
            });
            if broken {
                signals.status = format!("{phase}: level broken today");
                return signals;
            }
        }

        let stop_distance = signals.stop_distance();
        let to_outer = (second_level(&market.daily_pivot, side) - entry) * f64::from(side.sign());
        signals.entry_signal = side.sign();
        signals.split = SplitPlan::Partials {
            take_distances: medium_term_targets(stop_distance, to_outer),
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
    use crate::domain::trend::levels::SupportResistance;

    fn fixture(phase: TrendPhase) -> Fixture {
        let mut f = Fixture::new(at(5, 10, 0), 100.5);
        f.market.daily_trend.phase = phase;
        f.market.daily_pivot = compute_pivot(101.0, 99.0, 100.0);
        f.market.daily_atr.realized = 2.0;
        f.market.daily_atr.max = 2.4;
        f.market.daily_levels = SupportResistance {
            support: 98.0,
            resistance: Some(102.0),
        };
        f.bars
            .push(
                Timeframe::Secondary,
                Bar {
                    time: at(5, 9, 45),
                    open: 100.1,
                    high: 100.6,
                    low: 99.8,
                    close: 100.4,
                    volume: 1.0,
                },
            )
            .unwrap();
        f
    }

    #[test]
    fn range_phase_exits_everything() {
        let f = fixture(TrendPhase::Range);
        let s = DailyPhaseTrend.evaluate(&f.ctx());
        assert_eq!(s.exit_signal, ExitSignal::ExitAll);
        assert_eq!(s.execution_trend, 0);
        assert_eq!(s.entry_signal, 0);
    }

    #[test]
    fn middle_up_pullback_enters_with_medium_term_split() {
        let f = fixture(TrendPhase::MiddleUp);
        let s = DailyPhaseTrend.evaluate(&f.ctx());
        assert_eq!(s.entry_signal, 1);
        assert_eq!(s.execution_trend, 1);
        assert_eq!(s.exit_signal, ExitSignal::ExitSell);
        assert!((s.stop_loss_price - 98.0).abs() < 1e-9);
        // R2 = 102, so the second target is capped at 1.5
        match s.split {
            SplitPlan::Partials { take_distances } => {
                assert_eq!(take_distances.len(), 3);
                assert!((take_distances[0] - 2.5).abs() < 1e-9);
                assert!((take_distances[1] - 1.5).abs() < 1e-9);
                assert_eq!(take_distances[2], 0.0);
            }
            other => panic!("unexpected split: {other:?}"),
        }
    }

    #[test]
    fn retreat_keeps_direction_without_entry() {
        let f = fixture(TrendPhase::MiddleUpRetreat);
        let s = DailyPhaseTrend.evaluate(&f.ctx());
        assert_eq!(s.execution_trend, 1);
        assert_eq!(s.entry_signal, 0);
    }

    #[test]
    fn no_entry_outside_hours() {
        let mut f = fixture(TrendPhase::MiddleUp);
        f.now = at(5, 23, 0);
        assert_eq!(DailyPhaseTrend.evaluate(&f.ctx()).entry_signal, 0);
    }

    #[test]
    fn no_second_entry_at_the_same_price() {
        let mut f = fixture(TrendPhase::MiddleUp);
        f.positions.push(position(1, Side::Buy, at(5, 3, 0), 100.3));
        assert_eq!(DailyPhaseTrend.evaluate(&f.ctx()).entry_signal, 0);
    }

    #[test]
    fn beginning_up_cancelled_when_support_broke_today() {
        let mut f = fixture(TrendPhase::BeginningUp);
        f.bars
            .push(
                Timeframe::Primary,
                Bar {
                    time: at(5, 9, 45),
                    open: 100.0,
                    high: 100.6,
                    low: 97.5,
                    close: 100.4,
                    volume: 1.0,
                },
            )
            .unwrap();
        assert_eq!(DailyPhaseTrend.evaluate(&f.ctx()).entry_signal, 0);
    }

    #[test]
    fn targets_without_outer_room() {
        assert_eq!(medium_term_targets(1.0, -0.5), vec![1.0, 2.0, 0.0]);
        assert_eq!(medium_term_targets(1.0, 5.0), vec![1.0, 2.0, 0.0]);
    }
}
