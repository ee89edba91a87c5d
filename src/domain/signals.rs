//! Strategy output and the requests sent to the execution backend.

use crate::domain::counters::CounterWrite;
use crate::domain::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitSignal {
    #[default]
    None,
    ExitBuy,
    ExitSell,
    ExitAll,
}

impl ExitSignal {
    pub fn closes(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (ExitSignal::ExitAll, _)
                | (ExitSignal::ExitBuy, Side::Buy)
                | (ExitSignal::ExitSell, Side::Sell)
        )
    }
}

/// How an entry is turned into orders.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SplitPlan {
    /// One market order; the take-profit follows the configured mode.
    #[default]
    Single,
    /// Market orders sharing the risk evenly, one per take-profit distance
    /// (0.0 = no take-profit).
    Partials { take_distances: Vec<f64> },
    /// Pending limit orders at the given prices, risk shared by weight.
    Limits { entries: Vec<(f64, f64)> },
}

/// What a strategy decided for one bar. Starts zeroed.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub execution_trend: i8,
    pub entry_signal: i8,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub exit_signal: ExitSignal,
    /// Multiplier on the configured per-trade risk.
    pub risk: f64,
    pub split: SplitPlan,
    pub status: String,
    pub counter_writes: Vec<CounterWrite>,
}

impl Default for Signals {
    fn default() -> Self {
        Self {
            execution_trend: 0,
            entry_signal: 0,
            entry_price: 0.0,
            stop_loss_price: 0.0,
            take_profit_price: 0.0,
            exit_signal: ExitSignal::None,
            risk: 1.0,
            split: SplitPlan::Single,
            status: String::new(),
            counter_writes: Vec::new(),
        }
    }
}

impl Signals {
    pub fn entry_side(&self) -> Option<Side> {
        Side::from_signal(self.entry_signal)
    }

    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss_price).abs()
    }

    /// Drop the entry, keeping the reason in the status text.
    pub fn veto(&mut self, reason: &str) {
        if self.entry_signal != 0 {
            self.entry_signal = 0;
            if self.status.is_empty() {
                self.status = reason.to_string();
            } else {
                self.status = format!("{}; {reason}", self.status);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub lots: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    /// 0.0 = no take-profit.
    pub take_profit_price: f64,
    pub is_pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifyRequest {
    pub ticket: u64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseSelector {
    All,
    Side(Side),
    Ticket(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseRequest {
    pub selector: CloseSelector,
    pub reason: String,
}

impl CloseRequest {
    pub fn new(selector: CloseSelector, reason: impl Into<String>) -> Self {
        Self {
            selector,
            reason: reason.into(),
        }
    }
}
