//! Trend strength and phase classification.
//!
//! Three votes (MA slope, high/low structure, three-rules breakout) are
//! combined into a [`TrendStrength`]; the phase is a pure function of the
//! votes, the strength and where the latest close sits against the current
//! period's pivot. Nothing is remembered between bars.

pub mod levels;
pub mod votes;

use std::fmt;

use tracing::debug;

use crate::domain::bar_series::BarSeries;
use crate::domain::error::PhasetraderError;
use crate::domain::indicator::pivot::PivotLevels;
use votes::{THREE_RULES_DOWN, THREE_RULES_UP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TrendStrength {
    DownStrong,
    DownNormal,
    DownWeak,
    #[default]
    Range,
    UpWeak,
    UpNormal,
    UpStrong,
}

impl TrendStrength {
    pub const ALL: [TrendStrength; 7] = [
        TrendStrength::DownStrong,
        TrendStrength::DownNormal,
        TrendStrength::DownWeak,
        TrendStrength::Range,
        TrendStrength::UpWeak,
        TrendStrength::UpNormal,
        TrendStrength::UpStrong,
    ];

    /// Clamp a signed score into the ordinal.
    pub fn from_score(score: i8) -> Self {
        match score {
            i8::MIN..=-3 => TrendStrength::DownStrong,
            -2 => TrendStrength::DownNormal,
            -1 => TrendStrength::DownWeak,
            0 => TrendStrength::Range,
            1 => TrendStrength::UpWeak,
            2 => TrendStrength::UpNormal,
            3..=i8::MAX => TrendStrength::UpStrong,
        }
    }

    pub fn score(&self) -> i8 {
        match self {
            TrendStrength::DownStrong => -3,
            TrendStrength::DownNormal => -2,
            TrendStrength::DownWeak => -1,
            TrendStrength::Range => 0,
            TrendStrength::UpWeak => 1,
            TrendStrength::UpNormal => 2,
            TrendStrength::UpStrong => 3,
        }
    }

    pub fn direction(&self) -> i8 {
        self.score().signum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrendPhase {
    #[default]
    Range,
    BeginningUp,
    MiddleUp,
    MiddleUpRetreat,
    FinalUp,
    BeginningDown,
    MiddleDown,
    MiddleDownRetreat,
    FinalDown,
}

impl TrendPhase {
    pub const ALL: [TrendPhase; 9] = [
        TrendPhase::Range,
        TrendPhase::BeginningUp,
        TrendPhase::MiddleUp,
        TrendPhase::MiddleUpRetreat,
        TrendPhase::FinalUp,
        TrendPhase::BeginningDown,
        TrendPhase::MiddleDown,
        TrendPhase::MiddleDownRetreat,
        TrendPhase::FinalDown,
    ];

    /// Signed phase code: positive for up phases, negative for down.
    pub fn code(&self) -> i8 {
        match self {
            TrendPhase::Range => 0,
            TrendPhase::BeginningUp => 1,
            TrendPhase::MiddleUp => 2,
            TrendPhase::MiddleUpRetreat => 3,
            TrendPhase::FinalUp => 4,
            TrendPhase::BeginningDown => -1,
            TrendPhase::MiddleDown => -2,
            TrendPhase::MiddleDownRetreat => -3,
            TrendPhase::FinalDown => -4,
        }
    }

    pub fn is_up(&self) -> bool {
        self.code() > 0
    }

    pub fn is_down(&self) -> bool {
        self.code() < 0
    }

    pub fn direction(&self) -> i8 {
        self.code().signum()
    }
}

impl fmt::Display for TrendPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrendPhase::Range => "range",
            TrendPhase::BeginningUp => "beginning_up",
            TrendPhase::MiddleUp => "middle_up",
            TrendPhase::MiddleUpRetreat => "middle_up_retreat",
            TrendPhase::FinalUp => "final_up",
            TrendPhase::BeginningDown => "beginning_down",
            TrendPhase::MiddleDown => "middle_down",
            TrendPhase::MiddleDownRetreat => "middle_down_retreat",
            TrendPhase::FinalDown => "final_down",
        };
        f.write_str(name)
    }
}

/// Latest close against the current period's pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PivotRelation {
    CrossedAbove,
    #[default]
    Above,
    CrossedBelow,
    Below,
    BeyondUpperOuter,
    BeyondLowerOuter,
}

impl PivotRelation {
    pub const ALL: [PivotRelation; 6] = [
        PivotRelation::CrossedAbove,
        PivotRelation::Above,
        PivotRelation::CrossedBelow,
        PivotRelation::Below,
        PivotRelation::BeyondUpperOuter,
        PivotRelation::BeyondLowerOuter,
    ];
}

pub fn pivot_relation(prev_close: f64, close: f64, levels: &PivotLevels) -> PivotRelation {
    let pivot = levels.pivot;
    if prev_close <= pivot && close > pivot {
        PivotRelation::CrossedAbove
    } else if prev_close >= pivot && close < pivot {
        PivotRelation::CrossedBelow
    } else if close > levels.r2 {
        PivotRelation::BeyondUpperOuter
    } else if close < levels.s2 {
        PivotRelation::BeyondLowerOuter
    } else if close >= pivot {
        PivotRelation::Above
    } else {
        PivotRelation::Below
    }
}

/// Phase from strength and pivot relation. Total over both inputs.
pub fn classify_phase(strength: TrendStrength, relation: PivotRelation) -> TrendPhase {
    use PivotRelation::*;
    use TrendStrength::*;

    match (strength, relation) {
        (Range, _) => TrendPhase::Range,

        (UpWeak | UpNormal | UpStrong, CrossedAbove) => TrendPhase::BeginningUp,
        (UpWeak | UpNormal | UpStrong, Above) => TrendPhase::MiddleUp,
        (UpStrong, BeyondUpperOuter) => TrendPhase::FinalUp,
        (UpWeak | UpNormal, BeyondUpperOuter) => TrendPhase::MiddleUp,
        (UpWeak, CrossedBelow | Below | BeyondLowerOuter) => TrendPhase::Range,
        (UpNormal | UpStrong, CrossedBelow | Below | BeyondLowerOuter) => {
            TrendPhase::MiddleUpRetreat
        }

        (DownWeak | DownNormal | DownStrong, CrossedBelow) => TrendPhase::BeginningDown,
        (DownWeak | DownNormal | DownStrong, Below) => TrendPhase::MiddleDown,
        (DownStrong, BeyondLowerOuter) => TrendPhase::FinalDown,
        (DownWeak | DownNormal, BeyondLowerOuter) => TrendPhase::MiddleDown,
        (DownWeak, CrossedAbove | Above | BeyondUpperOuter) => TrendPhase::Range,
        (DownNormal | DownStrong, CrossedAbove | Above | BeyondUpperOuter) => {
            TrendPhase::MiddleDownRetreat
        }
    }
}

/// Rule table over the raw votes. Returns `Range` when no rule applies.
pub fn classify_daily(ma: i8, high_low: i8, three_rules: i8) -> TrendPhase {
    if ma == 0 && three_rules == 0 {
        TrendPhase::Range
    } else if three_rules == THREE_RULES_UP && ma != 2 {
        TrendPhase::BeginningUp
    } else if three_rules == THREE_RULES_DOWN && ma != -2 {
        TrendPhase::BeginningDown
    } else if ma == 2 && high_low >= 0 {
        TrendPhase::MiddleUp
    } else if ma == 2 {
        TrendPhase::MiddleUpRetreat
    } else if ma == -2 && high_low <= 0 {
        TrendPhase::MiddleDown
    } else if ma == -2 {
        TrendPhase::MiddleDownRetreat
    } else {
        TrendPhase::Range
    }
}

/// The daily table, unless the close has just crossed the pivot, sits beyond
/// R2/S2, or the table has no rule; then the pivot-based phase wins.
pub fn resolve_phase(
    table: TrendPhase,
    strength: TrendStrength,
    relation: PivotRelation,
) -> TrendPhase {
    use PivotRelation::*;

    let pivot_phase = classify_phase(strength, relation);
    let decisive = matches!(
        relation,
        CrossedAbove | CrossedBelow | BeyondUpperOuter | BeyondLowerOuter
    );
    if pivot_phase != TrendPhase::Range && (decisive || table == TrendPhase::Range) {
        pivot_phase
    } else {
        table
    }
}

/// Agreeing MA and structure votes take the larger magnitude, a single vote
/// is weak, disagreement is range.
pub fn combine_votes(ma: i8, high_low: i8, three_rules: i8) -> TrendStrength {
    let structure = if three_rules != 0 {
        three_rules
    } else {
        high_low
    };
    match (ma.signum(), structure.signum()) {
        (0, 0) => TrendStrength::Range,
        (m, s) if m != 0 && s != 0 && m != s => TrendStrength::Range,
        (m, 0) => TrendStrength::from_score(m),
        (0, s) => TrendStrength::from_score(s),
        (m, _) => {
            let magnitude = ma.abs().max(structure.abs()).min(3);
            TrendStrength::from_score(m * magnitude)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrendState {
    pub ma: i8,
    pub high_low: i8,
    pub three_rules: i8,
    pub strength: TrendStrength,
    /// ma + high_low + three_rules
    pub total: i8,
    pub relation: PivotRelation,
    pub phase: TrendPhase,
}

impl TrendState {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Inputs for classifying one timeframe.
#[derive(Debug, Clone, Copy)]
pub struct TrendInputs<'a> {
    pub series: &'a BarSeries,
    pub ma_short: usize,
    pub ma_long: usize,
    pub atr: f64,
    pub levels: &'a PivotLevels,
    pub prev_close: f64,
    pub close: f64,
}

impl TrendInputs<'_> {
    /// Longest lookback the classifier touches.
    pub fn lookback(&self) -> usize {
        self.ma_long.max(self.ma_short).max(5)
    }
}

fn try_classify(inputs: &TrendInputs<'_>) -> Result<TrendState, PhasetraderError> {
    inputs.series.require(inputs.lookback())?;
    let ma = votes::ma_vote(inputs.series, inputs.ma_short, inputs.ma_long, inputs.atr)?;
    let high_low = votes::high_low_vote(inputs.series, 0)?;
    let three_rules = votes::three_rules_with_fallback(inputs.series, high_low)?;
    let strength = combine_votes(ma, high_low, three_rules);
    let relation = pivot_relation(inputs.prev_close, inputs.close, inputs.levels);

    let phase = resolve_phase(classify_daily(ma, high_low, three_rules), strength, relation);

    Ok(TrendState {
        ma,
        high_low,
        three_rules,
        strength,
        total: ma + high_low + three_rules,
        relation,
        phase,
    })
}

/// Classify one timeframe; short history yields a neutral state instead of
/// an error.
pub fn classify_timeframe(inputs: &TrendInputs<'_>) -> TrendState {
    match try_classify(inputs) {
        Ok(state) => state,
        Err(err) => {
            debug!(timeframe = %inputs.series.timeframe(), "trend classification skipped: {err}");
            TrendState::neutral()
        }
    }
}
