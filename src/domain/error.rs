//! Domain error types.

use crate::domain::bar_series::Timeframe;

/// Top-level error type for phasetrader.
#[derive(Debug, thiserror::Error)]
pub enum PhasetraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("insufficient history on {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        timeframe: Timeframe,
        bars: usize,
        minimum: usize,
    },

    #[error("bar at {time} on {timeframe} is not newer than the last bar")]
    BarOutOfOrder { timeframe: Timeframe, time: String },

    #[error("bar at {time} on {timeframe} has high {high} below low {low}")]
    InvertedBar {
        timeframe: Timeframe,
        time: String,
        high: f64,
        low: f64,
    },

    #[error("invalid stop distance {distance}")]
    InvalidStopDistance { distance: f64 },

    #[error("missing collaborator data: {what}")]
    MissingCollaboratorData { what: String },

    #[error("counter store error for instance {instance_id}: {reason}")]
    CounterStore { instance_id: u32, reason: String },

    #[error("data parse error in {file}: {reason}")]
    DataParse { file: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PhasetraderError> for std::process::ExitCode {
    fn from(err: &PhasetraderError) -> Self {
        let code: u8 = match err {
            PhasetraderError::Io(_) | PhasetraderError::CounterStore { .. } => 1,
            PhasetraderError::ConfigParse { .. }
            | PhasetraderError::ConfigMissing { .. }
            | PhasetraderError::ConfigInvalid { .. }
            | PhasetraderError::InvalidConfiguration { .. } => 2,
            PhasetraderError::DataParse { .. }
            | PhasetraderError::BarOutOfOrder { .. }
            | PhasetraderError::InvertedBar { .. }
            | PhasetraderError::InsufficientHistory { .. } => 3,
            PhasetraderError::InvalidStopDistance { .. }
            | PhasetraderError::MissingCollaboratorData { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
