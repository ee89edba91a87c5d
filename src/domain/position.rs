//! Read-only views of open positions and the trading account.

use std::fmt;

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buy, -1 for sell.
    pub fn sign(&self) -> i8 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn from_signal(signal: i8) -> Option<Self> {
        match signal.signum() {
            1 => Some(Side::Buy),
            -1 => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "buy" | "long" => Some(Side::Buy),
            "sell" | "short" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of one position as reported by the execution backend.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionView {
    pub ticket: u64,
    pub side: Side,
    pub open_time: NaiveDateTime,
    pub open_price: f64,
    pub stop_loss: f64,
    /// 0.0 means no take-profit.
    pub take_profit: f64,
    pub lots: f64,
    pub is_open: bool,
    pub profit: f64,
}

impl OpenPositionView {
    pub fn has_take_profit(&self) -> bool {
        self.take_profit != 0.0
    }

    /// Stop still on the losing side of the open price.
    pub fn stop_at_risk(&self) -> bool {
        match self.side {
            Side::Buy => self.open_price - self.stop_loss > 0.0,
            Side::Sell => self.open_price - self.stop_loss < 0.0,
        }
    }

    /// Signed money at stake between open price and stop: negative while the
    /// stop is on the losing side, positive once it locks in profit.
    pub fn stop_risk_amount(&self, value_per_point: f64) -> f64 {
        let distance = (self.open_price - self.stop_loss).abs();
        if self.stop_loss == 0.0 || distance == 0.0 {
            return 0.0;
        }
        let amount = distance * self.lots * value_per_point;
        if self.stop_at_risk() { -amount } else { amount }
    }

    /// Whether the stop at `new_stop` is tighter than the current one.
    pub fn tightens_stop(&self, new_stop: f64) -> bool {
        if self.stop_loss == 0.0 {
            return true;
        }
        match self.side {
            Side::Buy => new_stop > self.stop_loss,
            Side::Sell => new_stop < self.stop_loss,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub balance: f64,
    /// Open trade risk as a signed percentage of equity (negative = at risk).
    pub open_trade_risk_percent: f64,
}

impl AccountSnapshot {
    /// Add a virtual balance on top of the broker equity. The open-trade risk
    /// percentage is rescaled to the larger equity.
    pub fn with_topup(&self, topup: f64) -> Self {
        if topup <= 0.0 || self.equity <= 0.0 {
            return *self;
        }
        let equity = self.equity + topup;
        Self {
            equity,
            balance: self.balance + topup,
            open_trade_risk_percent: self.open_trade_risk_percent / (equity / self.equity),
        }
    }
}
