//! Everything a strategy may read for one evaluation.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};

use crate::domain::bar_series::{Timeframe, TimeframeSet};
use crate::domain::config::EngineConfig;
use crate::domain::counters::PersistedCounters;
use crate::domain::market::MarketIndicators;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{AccountSnapshot, OpenPositionView, Side};

/// Multiplier on the adjust points while spreads widen around the day
/// change.
const DAY_TRANSITION_SPREAD_FACTOR: f64 = 3.0;

pub struct StrategyContext<'a> {
    pub config: &'a EngineConfig,
    pub bars: &'a TimeframeSet,
    pub market: &'a MarketIndicators,
    pub account: AccountSnapshot,
    pub positions: &'a [OpenPositionView],
    pub counters: &'a PersistedCounters,
    pub now: NaiveDateTime,
    pub bid: f64,
    pub ask: f64,
}

/// True between 23:40 and 00:20.
pub fn in_day_transition(time: NaiveDateTime) -> bool {
    let t = time.time();
    t >= NaiveTime::from_hms_opt(23, 40, 0).unwrap_or(NaiveTime::MIN)
        || t < NaiveTime::from_hms_opt(0, 20, 0).unwrap_or(NaiveTime::MIN)
}

impl<'a> StrategyContext<'a> {
    pub fn hour(&self) -> u32 {
        self.now.hour()
    }

    /// Broker adjust points, widened during the day transition.
    pub fn adjust(&self) -> f64 {
        if in_day_transition(self.now) {
            self.config.adjust_points * DAY_TRANSITION_SPREAD_FACTOR
        } else {
            self.config.adjust_points
        }
    }

    /// Entry price for a market order on `side`.
    pub fn market_price(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &'a OpenPositionView> {
        self.positions.iter().filter(|p| p.is_open)
    }

    pub fn open_on(&self, side: Side) -> impl Iterator<Item = &'a OpenPositionView> {
        self.open_positions().filter(move |p| p.side == side)
    }

    /// An open position on `side` opened at or after `since` within
    /// `tolerance` of `price`.
    pub fn has_entry_near(
        &self,
        side: Side,
        price: f64,
        tolerance: f64,
        since: NaiveDateTime,
    ) -> bool {
        self.open_on(side)
            .any(|p| p.open_time >= since && (p.open_price - price).abs() < tolerance)
    }

    pub fn start_of_day(&self) -> NaiveDateTime {
        self.now.date().and_time(NaiveTime::MIN)
    }

    /// Midnight of the Monday of the current week.
    pub fn start_of_week(&self) -> NaiveDateTime {
        let date = self.now.date();
        let back = Duration::days(i64::from(date.weekday().num_days_from_monday()));
        (date - back).and_time(NaiveTime::MIN)
    }

    /// Latest closed bar of `timeframe` at `shift`.
    pub fn bar(&self, timeframe: Timeframe, shift: usize) -> Option<&'a Bar> {
        self.bars.get(timeframe).shift(shift)
    }

    /// The open day built from primary bars, if any have printed.
    pub fn today(&self) -> Option<Bar> {
        self.bars.current_period(Timeframe::Daily)
    }
}
