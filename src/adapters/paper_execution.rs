//! In-memory execution backend that records every request.

use tracing::info;

use crate::domain::error::PhasetraderError;
use crate::domain::position::{AccountSnapshot, OpenPositionView};
use crate::domain::signals::{CloseRequest, CloseSelector, ModifyRequest, OrderRequest};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, Default)]
pub struct PaperExecution {
    account: Option<AccountSnapshot>,
    positions: Option<Vec<OpenPositionView>>,
    quote: Option<(f64, f64)>,
    pub closes: Vec<CloseRequest>,
    pub modifies: Vec<ModifyRequest>,
    pub orders: Vec<OrderRequest>,
}

impl PaperExecution {
    pub fn new(account: AccountSnapshot, positions: Vec<OpenPositionView>) -> Self {
        Self {
            account: Some(account),
            positions: Some(positions),
            ..Self::default()
        }
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.quote = Some((bid, ask));
        self
    }

    pub fn positions(&self) -> &[OpenPositionView] {
        self.positions.as_deref().unwrap_or_default()
    }
}

impl ExecutionPort for PaperExecution {
    fn account_snapshot(&self) -> Option<AccountSnapshot> {
        self.account
    }

    fn open_positions(&self) -> Option<Vec<OpenPositionView>> {
        self.positions
            .as_ref()
            .map(|all| all.iter().filter(|p| p.is_open).cloned().collect())
    }

    fn quote(&self) -> Option<(f64, f64)> {
        self.quote
    }

    fn close(&mut self, request: &CloseRequest) -> Result<(), PhasetraderError> {
        if let Some(positions) = self.positions.as_mut() {
            for p in positions.iter_mut().filter(|p| p.is_open) {
                let hit = match request.selector {
                    CloseSelector::All => true,
                    CloseSelector::Side(side) => p.side == side,
                    CloseSelector::Ticket(ticket) => p.ticket == ticket,
                };
                if hit {
                    p.is_open = false;
                }
            }
        }
        info!(selector = ?request.selector, reason = %request.reason, "paper close");
        self.closes.push(request.clone());
        Ok(())
    }

    fn modify(&mut self, request: &ModifyRequest) -> Result<(), PhasetraderError> {
        let position = self
            .positions
            .as_mut()
            .and_then(|all| all.iter_mut().find(|p| p.ticket == request.ticket && p.is_open))
            .ok_or_else(|| PhasetraderError::MissingCollaboratorData {
                what: format!("open position {}", request.ticket),
            })?;
        position.stop_loss = request.stop_loss_price;
        position.take_profit = request.take_profit_price;
        self.modifies.push(request.clone());
        Ok(())
    }

    fn submit(&mut self, order: &OrderRequest) -> Result<(), PhasetraderError> {
        info!(
            side = %order.side,
            lots = order.lots,
            entry = order.entry_price,
            stop = order.stop_loss_price,
            take_profit = order.take_profit_price,
            pending = order.is_pending,
            "paper order"
        );
        self.orders.push(order.clone());
        Ok(())
    }
}
