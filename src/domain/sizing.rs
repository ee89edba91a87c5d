//! Position sizing and order splitting.
//!
//! Lots are sized so that a stop-out loses `risk` percent of equity, then
//! rounded up to the broker's lot step. Split entries share the risk across
//! their orders without exceeding it.

use tracing::debug;

use crate::domain::config::TakeProfitMode;
use crate::domain::error::PhasetraderError;
use crate::domain::position::Side;
use crate::domain::signals::{OrderRequest, Signals, SplitPlan};
use crate::domain::symbol_policy::SymbolPolicy;

/// Share of a lot step ignored when rounding up, so that 0.3000000001 lots
/// stays 0.30.
const LOT_NOISE: f64 = 1e-6;

/// Lots risking `risk_percent` of `equity` over `stop_distance`.
pub fn size(
    stop_distance: f64,
    risk_percent: f64,
    equity: f64,
    policy: &SymbolPolicy,
) -> Result<f64, PhasetraderError> {
    if !(stop_distance > 0.0 && stop_distance.is_finite()) {
        return Err(PhasetraderError::InvalidStopDistance {
            distance: stop_distance,
        });
    }
    let raw = equity * risk_percent / 100.0 / (stop_distance * policy.value_per_point);
    let steps = (raw / policy.lot_step - LOT_NOISE).ceil().max(0.0);
    let lots = (steps * policy.lot_step).max(policy.min_lot);
    // Trim the float tail left by the multiplication.
    Ok((lots / policy.lot_step).round() * policy.lot_step)
}

/// Risk shares proportional to `weights`, summing to `risk`.
pub fn partial_risks(risk: f64, weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights
        .iter()
        .map(|w| if *w > 0.0 { risk * w / total } else { 0.0 })
        .collect()
}

/// Take-profit distance of a single order.
pub fn take_profit_distance(
    mode: TakeProfitMode,
    stop_distance: f64,
    daily_atr: f64,
    entry_price: f64,
    target_price: f64,
) -> f64 {
    match mode {
        TakeProfitMode::StopDistance => stop_distance,
        TakeProfitMode::None => 0.0,
        TakeProfitMode::DailyAtr => daily_atr,
        TakeProfitMode::TargetPrice if target_price != 0.0 => (target_price - entry_price).abs(),
        TakeProfitMode::TargetPrice => 0.0,
    }
}

/// Inputs shared by every order of one entry.
#[derive(Debug, Clone, Copy)]
pub struct SizingInputs<'a> {
    /// Percent of equity for the whole entry.
    pub risk_percent: f64,
    pub equity: f64,
    pub policy: &'a SymbolPolicy,
    pub take_profit_mode: TakeProfitMode,
    pub daily_atr: f64,
}

fn order(
    side: Side,
    entry: f64,
    stop: f64,
    take_distance: f64,
    risk_percent: f64,
    is_pending: bool,
    inputs: &SizingInputs<'_>,
) -> Result<OrderRequest, PhasetraderError> {
    let lots = size((entry - stop).abs(), risk_percent, inputs.equity, inputs.policy)?;
    let take_profit_price = if take_distance > 0.0 {
        entry + f64::from(side.sign()) * take_distance
    } else {
        0.0
    };
    Ok(OrderRequest {
        side,
        lots,
        entry_price: entry,
        stop_loss_price: stop,
        take_profit_price,
        is_pending,
    })
}

/// Orders for the entry in `signals`. Each result stands alone: an order
/// with an unusable stop fails without affecting the others.
pub fn split_orders(
    signals: &Signals,
    inputs: &SizingInputs<'_>,
) -> Vec<Result<OrderRequest, PhasetraderError>> {
    let Some(side) = signals.entry_side() else {
        return Vec::new();
    };
    let stop = signals.stop_loss_price;
    let orders: Vec<Result<OrderRequest, PhasetraderError>> = match &signals.split {
        SplitPlan::Single => {
            let take = take_profit_distance(
                inputs.take_profit_mode,
                signals.stop_distance(),
                inputs.daily_atr,
                signals.entry_price,
                signals.take_profit_price,
            );
            vec![order(
                side,
                signals.entry_price,
                stop,
                take,
                inputs.risk_percent,
                false,
                inputs,
            )]
        }
        SplitPlan::Partials { take_distances } => {
            let weights = vec![1.0; take_distances.len()];
            partial_risks(inputs.risk_percent, &weights)
                .into_iter()
                .zip(take_distances)
                .map(|(risk, take)| {
                    order(side, signals.entry_price, stop, *take, risk, false, inputs)
                })
                .collect()
        }
        SplitPlan::Limits { entries } => {
            let weights: Vec<f64> = entries.iter().map(|(_, w)| *w).collect();
            partial_risks(inputs.risk_percent, &weights)
                .into_iter()
                .zip(entries)
                .map(|(risk, (price, _))| order(side, *price, stop, 0.0, risk, true, inputs))
                .collect()
        }
    };
    debug!(
        side = %side,
        orders = orders.len(),
        risk_percent = inputs.risk_percent,
        "entry split"
    );
    orders
}
