//! Broker access port trait.

use crate::domain::error::PhasetraderError;
use crate::domain::position::{AccountSnapshot, OpenPositionView};
use crate::domain::signals::{CloseRequest, ModifyRequest, OrderRequest};

pub trait ExecutionPort {
    /// `None` when the backend could not report the account.
    fn account_snapshot(&self) -> Option<AccountSnapshot>;

    /// `None` when the backend could not report positions; an empty list
    /// means no positions.
    fn open_positions(&self) -> Option<Vec<OpenPositionView>>;

    /// Current (bid, ask), if the backend quotes one.
    fn quote(&self) -> Option<(f64, f64)>;

    fn close(&mut self, request: &CloseRequest) -> Result<(), PhasetraderError>;

    fn modify(&mut self, request: &ModifyRequest) -> Result<(), PhasetraderError>;

    fn submit(&mut self, order: &OrderRequest) -> Result<(), PhasetraderError>;
}
