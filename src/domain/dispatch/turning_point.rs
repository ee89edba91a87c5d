//! Daily trend entries gated by the persisted turning-point flag.
//!
//! After a winner of at least [`WINNER_R_MULTIPLE`] the flag stops further
//! entries on that side until a position on the other side is opened.

use crate::domain::context::StrategyContext;
use crate::domain::counters::{CounterWrite, TurningPoint as TurningState};
use crate::domain::dispatch::{Strategy, exit_against, protective_stop};
use crate::domain::position::{OpenPositionView, Side};
use crate::domain::signals::Signals;
use crate::domain::trend::votes::{THREE_RULES_DOWN, THREE_RULES_UP};

pub const MODE: u32 = 13;

pub const WINNER_R_MULTIPLE: f64 = 2.0;

pub struct TurningPoint;

/// Profit of a closed position in multiples of its initial risk.
fn r_multiple(position: &OpenPositionView, value_per_point: f64) -> Option<f64> {
    let risk = (position.open_price - position.stop_loss).abs() * position.lots * value_per_point;
    (position.stop_loss != 0.0 && risk > 0.0).then(|| position.profit / risk)
}

impl TurningPoint {
    fn trend(ctx: &StrategyContext<'_>) -> Option<Side> {
        let trend = &ctx.market.daily_trend;
        match (trend.total.signum(), trend.three_rules) {
            (1, THREE_RULES_UP) => Some(Side::Buy),
            (-1, THREE_RULES_DOWN) => Some(Side::Sell),
            _ => None,
        }
    }

    /// The turning state after accounting for the latest closed trade and
    /// the open positions.
    fn update_state(ctx: &StrategyContext<'_>) -> TurningState {
        let mut state = ctx.counters.turning_point;
        let vpp = ctx.config.policy.value_per_point;

        let last_closed = ctx
            .positions
            .iter()
            .filter(|p| !p.is_open)
            .max_by_key(|p| p.open_time);
        if state.is_turning {
            if let Some(winner) = last_closed
                .filter(|p| r_multiple(p, vpp).is_some_and(|r| r >= WINNER_R_MULTIPLE))
            {
                state = TurningState {
                    side: Some(winner.side),
                    is_turning: false,
                };
            }
        }
        if !state.is_turning {
            if let Some(against) = state
                .side
                .and_then(|side| ctx.open_on(side.opposite()).next())
            {
                state = TurningState {
                    side: Some(against.side),
                    is_turning: true,
                };
            }
        }
        state
    }
}

impl Strategy for TurningPoint {
    fn name(&self) -> &str {
        "turning_point"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let mut signals = Signals::default();
        let state = Self::update_state(ctx);
        if state != ctx.counters.turning_point {
            signals.counter_writes.push(CounterWrite::TurningPoint(state));
        }

        let Some(side) = Self::trend(ctx) else {
            return signals;
        };
        signals.execution_trend = side.sign();
        signals.exit_signal = exit_against(side);

        if !state.is_turning && state.side == Some(side) {
            signals.status = format!("waiting for a turn after a {side} winner");
            return signals;
        }
        if ctx.open_on(side).next().is_some() {
            return signals;
        }

        let market = ctx.market;
        let entry = ctx.market_price(side);
        signals.entry_signal = side.sign();
        signals.entry_price = entry;
        signals.stop_loss_price =
            protective_stop(&market.daily_levels, side, entry, market.daily_atr.realized);
        signals
    }
}
