//! Mode 4: pending limit orders while the day trends, fades of the outer
//! pivot levels while it ranges.

use crate::domain::bar_series::Timeframe;
use crate::domain::context::StrategyContext;
use crate::domain::counters::{CounterWrite, PendingSignal};
use crate::domain::dispatch::{Strategy, beyond, exit_against};
use crate::domain::position::Side;
use crate::domain::signals::{Signals, SplitPlan};
use crate::domain::trend::TrendPhase;

pub const MODE: u32 = 4;

/// Retracements of the previous day used for beginning-phase limits, with
/// their relative weights.
const RETRACEMENTS: [(f64, f64); 2] = [(0.382, 0.5), (0.5, 1.0)];

/// Earliest hour at which a range fade is considered.
const RANGE_FADE_HOUR: u32 = 17;

pub struct TrendLimit;

impl Strategy for TrendLimit {
    fn name(&self) -> &str {
        "trend_limit"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let market = ctx.market;
        let phase = market.daily_phase();
        let mut signals = Signals {
            status: phase.to_string(),
            ..Signals::default()
        };
        let Some(side) = Side::from_signal(phase.direction()) else {
            return signals;
        };
        signals.execution_trend = side.sign();
        signals.exit_signal = exit_against(side);

        let Some(yesterday) = ctx.bar(Timeframe::Daily, 0) else {
            return signals;
        };
        let adjust = ctx.adjust();
        let direction = f64::from(side.sign());
        let range = yesterday.range();
        let (extreme, stop) = match side {
            Side::Buy => (yesterday.high, yesterday.low),
            Side::Sell => (yesterday.low, yesterday.high),
        };

        let levels: Vec<(f64, f64)> = match phase {
            TrendPhase::BeginningUp | TrendPhase::BeginningDown => RETRACEMENTS
                .iter()
                .map(|&(ratio, weight)| (extreme - direction * range * ratio + direction * adjust, weight))
                .collect(),
            TrendPhase::MiddleUp | TrendPhase::MiddleDown => {
                vec![(market.daily_pivot.pivot + direction * adjust, 1.0)]
            }
            _ => return signals,
        };
        signals.stop_loss_price = stop;

        let market_price = ctx.market_price(side);
        // A limit must rest behind the market and in front of the stop.
        let entries: Vec<(f64, f64)> = levels
            .into_iter()
            .filter(|&(price, _)| beyond(side, market_price, price) && beyond(side, price, stop))
            .collect();
        let traded_today = ctx
            .positions
            .iter()
            .any(|p| p.side == side && p.open_time >= ctx.start_of_day());
        if entries.is_empty() || traded_today {
            return signals;
        }

        signals.entry_signal = side.sign();
        signals.entry_price = entries[0].0;
        signals.split = SplitPlan::Limits { entries };
        signals
    }
}

pub struct RangeReversal;

impl RangeReversal {
    fn fade_side(ctx: &StrategyContext<'_>) -> Option<Side> {
        let market = ctx.market;
        if ctx.hour() < RANGE_FADE_HOUR {
            return None;
        }
        let today_range = ctx.today().map_or(0.0, |bar| bar.range());
        if market.daily_atr.max <= 0.0 || today_range < market.daily_atr.max {
            return None;
        }
        if ctx.ask < market.daily_pivot.s2 {
            Some(Side::Buy)
        } else if ctx.bid > market.daily_pivot.r2 {
            Some(Side::Sell)
        } else {
            None
        }
    }

    fn enter(ctx: &StrategyContext<'_>, side: Side, mut signals: Signals) -> Signals {
        let market = ctx.market;
        let entry = ctx.market_price(side);
        let atr = market.daily_atr.realized.max(market.daily_atr.max);
        let stop = match side {
            Side::Buy => market.daily_pivot.s3.min(entry - atr),
            Side::Sell => market.daily_pivot.r3.max(entry + atr),
        };
        let to_pivot = (market.daily_pivot.pivot - entry) * f64::from(side.sign());
        signals.entry_signal = side.sign();
        signals.entry_price = entry;
        signals.stop_loss_price = stop;
        if to_pivot > 0.0 {
            signals.take_profit_price = market.daily_pivot.pivot;
            signals.split = SplitPlan::Partials {
                take_distances: vec![to_pivot],
            };
        }
        signals
    }
}

impl Strategy for RangeReversal {
    fn name(&self) -> &str {
        "range_reversal"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let mut signals = Signals {
            status: TrendPhase::Range.to_string(),
            ..Signals::default()
        };

        if let Some(pending) = ctx.counters.live_pending_signal(ctx.now) {
            signals.counter_writes.push(CounterWrite::ClearPendingSignal);
            signals.status = format!("pending {} from {}", pending.side, pending.time);
            return Self::enter(ctx, pending.side, signals);
        }

        let Some(side) = Self::fade_side(ctx) else {
            return signals;
        };
        if ctx.hour() >= ctx.config.range_stop_hour {
            signals
                .counter_writes
                .push(CounterWrite::PendingSignal(PendingSignal {
                    side,
                    time: ctx.now,
                }));
            signals.status = format!("{side} recorded for the next session");
            return signals;
        }
        Self::enter(ctx, side, signals)
    }
}
