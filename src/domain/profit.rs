//! Risk scaling, risk vetoes and profit-taking exits.
//!
//! Runs after the strategy and the global filters, before orders are built.

use tracing::{debug, info};

use crate::domain::config::EngineConfig;
use crate::domain::context::StrategyContext;
use crate::domain::position::{OpenPositionView, Side};
use crate::domain::signals::{CloseRequest, CloseSelector, Signals};

/// Open positions without take-profit stacked near the entry price that
/// block another entry there.
const MAX_STACKED_POSITIONS: usize = 4;
/// Profit target as a multiple of the maximum strategy risk.
const PROFIT_TARGET_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitDecision {
    pub signals: Signals,
    pub closes: Vec<CloseRequest>,
    /// Strategy risk ceiling after macro scaling.
    pub max_strategy_risk: f64,
    /// Stop risk of open positions, in percent of equity, ignoring locked
    /// profit.
    pub strategy_risk: f64,
    /// Floating profit of open positions, in percent of equity.
    pub floating_pnl: f64,
}

/// Risk multiplier from the macro trend. Only an entry is scaled.
pub fn macro_scale(entry_signal: i8, macro_trend: i8) -> f64 {
    if entry_signal == 0 {
        1.0
    } else if macro_trend == 0 {
        0.8
    } else if entry_signal.signum() == -macro_trend.signum() {
        0.5
    } else {
        1.0
    }
}

fn percent_of(amount: f64, equity: f64) -> f64 {
    if equity > 0.0 { amount / equity * 100.0 } else { 0.0 }
}

/// Sum of the money at stake on stops still on the losing side, as a
/// (negative) percentage of equity.
pub fn strategy_risk_without_locked_profit(
    positions: &[OpenPositionView],
    value_per_point: f64,
    equity: f64,
) -> f64 {
    let at_risk: f64 = positions
        .iter()
        .filter(|p| p.is_open)
        .map(|p| p.stop_risk_amount(value_per_point))
        .filter(|amount| *amount < 0.0)
        .sum();
    percent_of(at_risk, equity)
}

pub fn floating_pnl(positions: &[OpenPositionView], equity: f64) -> f64 {
    let profit: f64 = positions.iter().filter(|p| p.is_open).map(|p| p.profit).sum();
    percent_of(profit, equity)
}

fn close_short_term(
    ctx: &StrategyContext<'_>,
    side: Side,
    since: chrono::NaiveDateTime,
    reason: &str,
    closes: &mut Vec<CloseRequest>,
) {
    for position in ctx
        .open_on(side)
        .filter(|p| p.has_take_profit() && p.open_time >= since)
    {
        push_close(closes, position.ticket, reason);
    }
}

fn push_close(closes: &mut Vec<CloseRequest>, ticket: u64, reason: &str) {
    let selector = CloseSelector::Ticket(ticket);
    if !closes.iter().any(|c| c.selector == selector) {
        closes.push(CloseRequest::new(selector, reason));
    }
}

/// Close the biggest winners on `side` while the remaining floating profit
/// stays at or above `target`.
fn close_winning_positions(
    ctx: &StrategyContext<'_>,
    side: Side,
    pnl: f64,
    target: f64,
    closes: &mut Vec<CloseRequest>,
) {
    let mut winners: Vec<&OpenPositionView> =
        ctx.open_on(side).filter(|p| p.profit > 0.0).collect();
    winners.sort_by(|a, b| b.profit.total_cmp(&a.profit));

    let mut remaining = pnl;
    for winner in winners {
        if remaining < target {
            break;
        }
        push_close(closes, winner.ticket, "profit target reached");
        remaining -= percent_of(winner.profit, ctx.account.equity);
    }
}

pub fn manage(ctx: &StrategyContext<'_>, signals: Signals, config: &EngineConfig) -> ProfitDecision {
    let mut signals = signals;
    let mut closes = Vec::new();
    let equity = ctx.account.equity;
    let market = ctx.market;

    let scale = macro_scale(signals.entry_signal, config.macro_trend);
    signals.risk *= scale;
    let max_strategy_risk = config.max_strategy_risk * scale;

    let strategy_risk =
        strategy_risk_without_locked_profit(ctx.positions, config.policy.value_per_point, equity);
    let pnl = floating_pnl(ctx.positions, equity);

    if strategy_risk < -max_strategy_risk {
        debug!(strategy_risk, max_strategy_risk, "entry vetoed by strategy risk");
        signals.veto("strategy risk ceiling");
    }
    if pnl < -config.account_risk_percent {
        debug!(floating_pnl = pnl, "entry vetoed by floating loss");
        signals.veto("floating loss ceiling");
    }
    if signals.entry_signal != 0 {
        let tolerance = market.daily_atr.realized / 3.0;
        let stacked = ctx
            .open_positions()
            .filter(|p| !p.has_take_profit() && (signals.entry_price - p.open_price).abs() < tolerance)
            .count();
        if stacked >= MAX_STACKED_POSITIONS {
            signals.veto("positions stacked at this price");
        }
    }

    let phase = market.daily_phase();
    let target = config.max_strategy_risk * PROFIT_TARGET_MULTIPLE;
    for side in [Side::Buy, Side::Sell] {
        let in_phase = match side {
            Side::Buy => phase.is_up(),
            Side::Sell => phase.is_down(),
        };
        if !in_phase {
            continue;
        }
        let (price, daily_extreme, weekly_outer) = match side {
            Side::Buy => (ctx.ask, market.daily_pivot.r3, market.weekly_pivot.r2),
            Side::Sell => (ctx.bid, market.daily_pivot.s3, market.weekly_pivot.s2),
        };
        let past = |level: f64| match side {
            Side::Buy => level > 0.0 && price > level,
            Side::Sell => level > 0.0 && price < level,
        };

        if past(daily_extreme) {
            if signals.entry_signal != 0 {
                signals.veto("beyond daily third level");
            } else {
                close_short_term(ctx, side, ctx.start_of_day(), "beyond daily third level", &mut closes);
            }
        }
        if past(weekly_outer) {
            if signals.entry_signal != 0 {
                signals.veto("beyond weekly second level");
            } else {
                close_short_term(
                    ctx,
                    side,
                    ctx.start_of_week(),
                    "beyond weekly second level",
                    &mut closes,
                );
            }
            if pnl > target {
                close_winning_positions(ctx, side, pnl, target, &mut closes);
            }
        }
    }

    if !closes.is_empty() {
        info!(closes = closes.len(), floating_pnl = pnl, "profit management closing positions");
    }

    ProfitDecision {
        signals,
        closes,
        max_strategy_risk,
        strategy_risk,
        floating_pnl: pnl,
    }
}
