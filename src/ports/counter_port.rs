//! Persisted counter store port trait.
//!
//! A session reads the counters once when opened and writes them at most
//! once. Dropping a session without committing releases it unchanged.

use crate::domain::counters::PersistedCounters;
use crate::domain::error::PhasetraderError;

pub trait CounterStore {
    fn open(&self, instance_id: u32) -> Result<Box<dyn CounterSession + '_>, PhasetraderError>;
}

pub trait CounterSession {
    fn counters(&self) -> &PersistedCounters;

    fn commit(self: Box<Self>, counters: &PersistedCounters) -> Result<(), PhasetraderError>;
}
