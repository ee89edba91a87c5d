//! Per-timeframe bar history and the timeframe set for one instrument.
//!
//! Every [`BarSeries`] holds closed bars only. Bars are addressed by shift:
//! shift 0 is the most recently closed bar, shift 1 the one before it. The
//! in-progress period of a higher timeframe is never stored; it is rebuilt
//! from primary bars by [`TimeframeSet::current_period`].

use std::collections::VecDeque;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use super::error::PhasetraderError;
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    Primary,
    Secondary,
    Hourly,
    FourHourly,
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::Primary,
        Timeframe::Secondary,
        Timeframe::Hourly,
        Timeframe::FourHourly,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Timeframe::Primary => "primary",
            Timeframe::Secondary => "secondary",
            Timeframe::Hourly => "hourly",
            Timeframe::FourHourly => "four_hourly",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Key identifying the period a timestamp belongs to. Primary and
    /// secondary series have no aggregate period.
    fn period_key(self, time: NaiveDateTime) -> Option<(i32, u32, u32)> {
        let days = time.date().num_days_from_ce();
        match self {
            Timeframe::Primary | Timeframe::Secondary => None,
            Timeframe::Hourly => Some((days, time.hour(), 0)),
            Timeframe::FourHourly => Some((days, time.hour() / 4, 0)),
            Timeframe::Daily => Some((days, 0, 0)),
            Timeframe::Weekly => {
                let week = time.date().iso_week();
                Some((week.year(), week.week(), 0))
            }
            Timeframe::Monthly => Some((time.year(), time.month(), 0)),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Append-only, capacity-bounded history of closed bars.
#[derive(Debug, Clone)]
pub struct BarSeries {
    timeframe: Timeframe,
    capacity: usize,
    bars: VecDeque<Bar>,
}

impl BarSeries {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timeframe,
            capacity,
            bars: VecDeque::with_capacity(capacity),
        }
    }

    pub fn from_bars(
        timeframe: Timeframe,
        capacity: usize,
        bars: impl IntoIterator<Item = Bar>,
    ) -> Result<Self, PhasetraderError> {
        let mut series = Self::new(timeframe, capacity);
        for bar in bars {
            series.push(bar)?;
        }
        Ok(series)
    }

    /// Append a closed bar, evicting the oldest when full.
    pub fn push(&mut self, bar: Bar) -> Result<(), PhasetraderError> {
        if bar.high < bar.low {
            return Err(PhasetraderError::InvertedBar {
                timeframe: self.timeframe,
                time: bar.time.to_string(),
                high: bar.high,
                low: bar.low,
            });
        }
        if let Some(last) = self.bars.back() {
            if bar.time <= last.time {
                return Err(PhasetraderError::BarOutOfOrder {
                    timeframe: self.timeframe,
                    time: bar.time.to_string(),
                });
            }
        }
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        Ok(())
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn shift(&self, shift: usize) -> Option<&Bar> {
        let len = self.bars.len();
        if shift >= len {
            return None;
        }
        self.bars.get(len - 1 - shift)
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Bar> + ExactSizeIterator {
        self.bars.iter()
    }

    pub fn require(&self, minimum: usize) -> Result<(), PhasetraderError> {
        if self.bars.len() < minimum {
            return Err(PhasetraderError::InsufficientHistory {
                timeframe: self.timeframe,
                bars: self.bars.len(),
                minimum,
            });
        }
        Ok(())
    }
}

/// The seven time-aligned series of one instrument.
#[derive(Debug, Clone)]
pub struct TimeframeSet {
    series: Vec<BarSeries>,
}

impl TimeframeSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: Timeframe::ALL
                .into_iter()
                .map(|tf| BarSeries::new(tf, capacity))
                .collect(),
        }
    }

    pub fn get(&self, timeframe: Timeframe) -> &BarSeries {
        &self.series[timeframe.index()]
    }

    pub fn push(&mut self, timeframe: Timeframe, bar: Bar) -> Result<(), PhasetraderError> {
        self.series[timeframe.index()].push(bar)
    }

    pub fn replace(&mut self, series: BarSeries) {
        let index = series.timeframe().index();
        self.series[index] = series;
    }

    pub fn now(&self) -> Option<NaiveDateTime> {
        self.get(Timeframe::Primary).latest().map(|b| b.time)
    }

    /// Aggregate of the primary bars inside the still-open period of
    /// `timeframe`, or `None` when that period has no primary bars yet.
    pub fn current_period(&self, timeframe: Timeframe) -> Option<Bar> {
        let primary = self.get(Timeframe::Primary);
        let latest = primary.latest()?;
        let key = timeframe.period_key(latest.time)?;
        let last_closed = self.get(timeframe).latest().map(|b| b.time);
        if let Some(closed) = last_closed {
            if timeframe.period_key(closed) == Some(key) {
                return None;
            }
        }

        let mut members: Vec<&Bar> = primary
            .iter()
            .rev()
            .take_while(|b| {
                timeframe.period_key(b.time) == Some(key)
                    && last_closed.is_none_or(|closed| b.time > closed)
            })
            .collect();
        members.reverse();

        let (first, rest) = members.split_first()?;
        let mut period = (*first).clone();
        for bar in rest {
            period.absorb(bar);
        }
        Some(period)
    }

    /// Timeframes whose latest closed bar is not consistent with the latest
    /// primary bar.
    pub fn misaligned(&self, execution_minutes: u32) -> Vec<Timeframe> {
        let Some(now) = self.now() else {
            return vec![Timeframe::Primary];
        };
        let mut failures = Vec::new();

        let max_lag = |tf: Timeframe, lag: Duration| match self.get(tf).latest() {
            Some(bar) => bar.time > now || now - bar.time > lag,
            None => true,
        };

        if max_lag(
            Timeframe::Secondary,
            Duration::minutes(2 * i64::from(execution_minutes.max(1))),
        ) {
            failures.push(Timeframe::Secondary);
        }
        if max_lag(Timeframe::Hourly, Duration::hours(2)) {
            failures.push(Timeframe::Hourly);
        }
        match self.get(Timeframe::Daily).latest() {
            Some(day) => {
                if day.time.date() >= now.date() || now - day.time > Duration::days(4) {
                    failures.push(Timeframe::Daily);
                }
            }
            None => failures.push(Timeframe::Daily),
        }
        failures
    }
}
