//! Core domain types and logic.

pub mod ohlcv;
pub mod bar_series;
pub mod error;
pub mod indicator;
pub mod trend;
pub mod market;
pub mod position;
pub mod symbol_policy;
pub mod config;
pub mod config_validation;
pub mod counters;
pub mod signals;
pub mod context;
pub mod dispatch;
pub mod sizing;
pub mod profit;
pub mod engine;
