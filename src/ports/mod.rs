//! Port traits: the engine's boundaries to configuration, the broker and
//! the counter store.

pub mod config_port;
pub mod counter_port;
pub mod execution_port;
