//! Daily three-rules breakout with a fixed ATR target.

use crate::domain::context::StrategyContext;
use crate::domain::dispatch::{Strategy, exit_against};
use crate::domain::position::Side;
use crate::domain::signals::{Signals, SplitPlan};
use crate::domain::trend::votes::{THREE_RULES_DOWN, THREE_RULES_UP};

pub const MODE: u32 = 16;

const STOP_ATR_MULTIPLE: f64 = 1.2;

pub struct DailySwing;

impl Strategy for DailySwing {
    fn name(&self) -> &str {
        "daily_swing"
    }

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals {
        let market = ctx.market;
        let side = match market.daily_trend.three_rules {
            THREE_RULES_UP => Side::Buy,
            THREE_RULES_DOWN => Side::Sell,
            _ => return Signals::default(),
        };
        let atr = market.daily_atr.realized;
        let entry = ctx.market_price(side);
        let direction = f64::from(side.sign());

        let mut signals = Signals {
            execution_trend: side.sign(),
            exit_signal: exit_against(side),
            entry_price: entry,
            stop_loss_price: entry - direction * STOP_ATR_MULTIPLE * atr,
            take_profit_price: entry + direction * atr,
            split: SplitPlan::Partials {
                take_distances: vec![atr],
            },
            status: format!("three rules {}", market.daily_trend.three_rules),
            ..Signals::default()
        };

        let traded_today = ctx
            .positions
            .iter()
            .any(|p| p.side == side && p.open_time >= ctx.start_of_day());
        if atr > 0.0 && !traded_today && ctx.hour() >= ctx.config.policy.start_hour {
            signals.entry_signal = side.sign();
        }
        signals
    }
}
