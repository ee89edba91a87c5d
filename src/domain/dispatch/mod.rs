//! Strategy variants keyed by configured mode and daily trend phase.
//!
//! A [`StrategyRegistry`] is built once when the configuration is loaded.
//! Each mode may register strategies for specific phases plus a fallback
//! used for every other phase. After the variant has run, the global
//! filters in [`apply_global_filters`] veto entries the account cannot
//! carry.

pub mod daily_phase;
pub mod daily_swing;
pub mod key_k;
pub mod range_limit;
pub mod turning_point;
pub mod weekly_pivot;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::config::EngineConfig;
use crate::domain::context::StrategyContext;
use crate::domain::indicator::pivot::PivotLevels;
use crate::domain::position::{AccountSnapshot, Side};
use crate::domain::signals::{ExitSignal, Signals};
use crate::domain::trend::TrendPhase;
use crate::domain::trend::levels::SupportResistance;

pub trait Strategy: Send + Sync {
    /// Name used in logs and the UI report.
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &StrategyContext<'_>) -> Signals;
}

#[derive(Default)]
pub struct StrategyRegistry {
    by_phase: HashMap<(u32, TrendPhase), Arc<dyn Strategy>>,
    fallback: HashMap<u32, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mode: u32, phase: TrendPhase, strategy: Arc<dyn Strategy>) {
        self.by_phase.insert((mode, phase), strategy);
    }

    pub fn register_fallback(&mut self, mode: u32, strategy: Arc<dyn Strategy>) {
        self.fallback.insert(mode, strategy);
    }

    pub fn resolve(&self, mode: u32, phase: TrendPhase) -> Option<&Arc<dyn Strategy>> {
        self.by_phase
            .get(&(mode, phase))
            .or_else(|| self.fallback.get(&mode))
    }

    /// Every mode with at least one registered strategy, ascending.
    pub fn modes(&self) -> Vec<u32> {
        let mut modes: Vec<u32> = self
            .fallback
            .keys()
            .copied()
            .chain(self.by_phase.keys().map(|(mode, _)| *mode))
            .collect();
        modes.sort_unstable();
        modes.dedup();
        modes
    }

    /// Run the variant for the configured mode and the current daily phase.
    /// An unregistered mode yields zeroed signals.
    pub fn dispatch(&self, ctx: &StrategyContext<'_>) -> Signals {
        let mode = ctx.config.mode;
        let phase = ctx.market.daily_phase();
        match self.resolve(mode, phase) {
            Some(strategy) => {
                let signals = strategy.evaluate(ctx);
                debug!(
                    mode,
                    %phase,
                    strategy = strategy.name(),
                    entry = signals.entry_signal,
                    execution_trend = signals.execution_trend,
                    "strategy evaluated"
                );
                signals
            }
            None => {
                warn!(mode, %phase, "no strategy registered for mode");
                Signals::default()
            }
        }
    }
}

/// Registry with every built-in variant.
pub fn standard_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register_fallback(daily_phase::MODE, Arc::new(daily_phase::DailyPhaseTrend));
    registry.register(
        range_limit::MODE,
        TrendPhase::Range,
        Arc::new(range_limit::RangeReversal),
    );
    registry.register_fallback(range_limit::MODE, Arc::new(range_limit::TrendLimit));
    registry.register_fallback(key_k::MODE, Arc::new(key_k::KeyKReversal));
    registry.register_fallback(weekly_pivot::MODE, Arc::new(weekly_pivot::WeeklyPivot));
    registry.register_fallback(turning_point::MODE, Arc::new(turning_point::TurningPoint));
    registry.register_fallback(daily_swing::MODE, Arc::new(daily_swing::DailySwing));
    registry
}

/// Account and side filters. Applying them twice changes nothing.
pub fn apply_global_filters(
    mut signals: Signals,
    account: &AccountSnapshot,
    config: &EngineConfig,
) -> Signals {
    if signals.entry_signal != 0 && account.open_trade_risk_percent < -config.max_account_risk {
        debug!(
            open_trade_risk = account.open_trade_risk_percent,
            ceiling = config.max_account_risk,
            "entry vetoed by account risk"
        );
        signals.veto("account risk ceiling");
    }
    if config.one_side != 0 && signals.entry_signal != 0 && config.one_side != signals.entry_signal
    {
        signals.veto("one-side restriction");
    }
    signals
}

/// Hours during which new entries are accepted.
pub(crate) const ENTRY_HOURS: std::ops::RangeInclusive<u32> = 2..=22;

/// Exit signal that closes positions against `side`.
pub(crate) fn exit_against(side: Side) -> ExitSignal {
    match side {
        Side::Buy => ExitSignal::ExitSell,
        Side::Sell => ExitSignal::ExitBuy,
    }
}

/// R1 for buys, S1 for sells.
pub(crate) fn first_level(levels: &PivotLevels, side: Side) -> f64 {
    match side {
        Side::Buy => levels.r1,
        Side::Sell => levels.s1,
    }
}

/// R2 for buys, S2 for sells.
pub(crate) fn second_level(levels: &PivotLevels, side: Side) -> f64 {
    match side {
        Side::Buy => levels.r2,
        Side::Sell => levels.s2,
    }
}

/// The selected level behind an entry on `side`, widened to at least
/// `atr` from the entry.
pub(crate) fn protective_stop(
    levels: &SupportResistance,
    side: Side,
    entry: f64,
    atr: f64,
) -> f64 {
    match side {
        Side::Buy => levels.support.min(entry - atr),
        Side::Sell => levels
            .resistance
            .map_or(entry + atr, |r| r.max(entry + atr)),
    }
}

/// `price` is beyond `level` in the direction of `side`.
pub(crate) fn beyond(side: Side, price: f64, level: f64) -> bool {
    match side {
        Side::Buy => price > level,
        Side::Sell => price < level,
    }
}
