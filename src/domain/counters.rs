//! Per-instance state that survives between evaluations.

use chrono::{Duration, NaiveDateTime};

use crate::domain::position::Side;

/// A range-order signal recorded late in the day, honoured until it is one
/// day old.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSignal {
    pub side: Side,
    pub time: NaiveDateTime,
}

impl PendingSignal {
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        now >= self.time && now - self.time < Duration::days(1)
    }
}

/// Whether the next entry may follow the side of the last big winner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurningPoint {
    pub side: Option<Side>,
    pub is_turning: bool,
}

impl Default for TurningPoint {
    fn default() -> Self {
        Self {
            side: None,
            is_turning: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PersistedCounters {
    pub rate_error_count: u32,
    pub pending_signal: Option<PendingSignal>,
    pub turning_point: TurningPoint,
}

/// A single change requested by a strategy or the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterWrite {
    RateErrors(u32),
    PendingSignal(PendingSignal),
    ClearPendingSignal,
    TurningPoint(TurningPoint),
}

impl PersistedCounters {
    /// Counters after `writes`, applied in order.
    pub fn with_writes(&self, writes: &[CounterWrite]) -> Self {
        let mut next = *self;
        for write in writes {
            match *write {
                CounterWrite::RateErrors(count) => next.rate_error_count = count,
                CounterWrite::PendingSignal(signal) => next.pending_signal = Some(signal),
                CounterWrite::ClearPendingSignal => next.pending_signal = None,
                CounterWrite::TurningPoint(point) => next.turning_point = point,
            }
        }
        next
    }

    /// The pending signal, if it is still within its one-day window.
    pub fn live_pending_signal(&self, now: NaiveDateTime) -> Option<PendingSignal> {
        self.pending_signal.filter(|s| s.is_live(now))
    }
}
