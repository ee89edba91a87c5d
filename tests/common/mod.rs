#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use phasetrader::adapters::file_config_adapter::FileConfigAdapter;
use phasetrader::domain::bar_series::{Timeframe, TimeframeSet};
use phasetrader::domain::config::EngineConfig;
use phasetrader::domain::dispatch::standard_registry;
pub use phasetrader::domain::ohlcv::Bar;
use phasetrader::domain::position::{AccountSnapshot, OpenPositionView, Side};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Backtesting instance trading a synthetic symbol worth 1 per point per lot.
pub const BACKTEST_INI: &str = r#"
[instance]
id = 7
symbol = TEST
mode = 16
backtesting = yes
capacity = 300

[risk]
risk = 1.0
max_strategy_risk = 6.0
max_account_risk = 3.0
account_risk_percent = 3.0

[indicators]
atr_period = 20
daily_ma_short = 2
daily_ma_long = 8

[policy.TEST]
value_per_point = 1.0
lot_step = 0.01
min_lot = 0.01
"#;

/// Same instance with a different mode.
pub fn ini_with_mode(mode: u32) -> String {
    BACKTEST_INI.replace("mode = 16", &format!("mode = {mode}"))
}

/// Same instance evaluated as a live account.
pub fn live_ini() -> String {
    BACKTEST_INI.replace("backtesting = yes", "backtesting = no")
}

pub fn config_from(ini: &str) -> EngineConfig {
    let adapter = FileConfigAdapter::from_string(ini).unwrap();
    phasetrader::domain::config_validation::validate_engine_config(
        &adapter,
        &standard_registry().modes(),
    )
    .unwrap();
    EngineConfig::from_port(&adapter).unwrap()
}

/// March 2024; the 4th is a Monday.
pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn make_bar(time: NaiveDateTime, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        time,
        open: (high + low) / 2.0,
        high,
        low,
        close,
        volume: 100.0,
    }
}

/// `count` daily bars ending on `last`, each one point higher than the one
/// before: range 2, close half a point below the high. The final bar has
/// low 139, high 141, close 140.5 when `count` is 40.
pub fn rising_daily(count: usize, last: NaiveDate) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let day = last - Duration::days((count - 1 - i) as i64);
            let base = 100.0 + i as f64;
            make_bar(
                day.and_hms_opt(0, 0, 0).unwrap(),
                base + 2.0,
                base,
                base + 1.5,
            )
        })
        .collect()
}

/// Identical daily bars: no trend vote fires.
pub fn flat_daily(count: usize, last: NaiveDate) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let day = last - Duration::days((count - 1 - i) as i64);
            make_bar(day.and_hms_opt(0, 0, 0).unwrap(), 101.0, 99.0, 100.0)
        })
        .collect()
}

/// Quiet primary bars from 08:00 to `until` on `day`, all closing at `close`.
pub fn primary_session(day: u32, until_hour: u32, close: f64) -> Vec<Bar> {
    (8..=until_hour)
        .flat_map(|h| [0, 15, 30, 45].map(move |m| (h, m)))
        .filter(|&(h, m)| h < until_hour || m == 0)
        .map(|(h, m)| make_bar(at(day, h, m), close + 0.1, close - 0.1, close))
        .collect()
}

/// Rising daily history up to Monday the 4th and a quiet Tuesday morning.
pub fn rising_market() -> TimeframeSet {
    let mut set = TimeframeSet::new(300);
    for bar in rising_daily(40, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()) {
        set.push(Timeframe::Daily, bar).unwrap();
    }
    for bar in primary_session(5, 10, 140.5) {
        set.push(Timeframe::Primary, bar).unwrap();
    }
    set
}

pub fn flat_market() -> TimeframeSet {
    let mut set = TimeframeSet::new(300);
    for bar in flat_daily(40, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()) {
        set.push(Timeframe::Daily, bar).unwrap();
    }
    for bar in primary_session(5, 10, 100.0) {
        set.push(Timeframe::Primary, bar).unwrap();
    }
    set
}

pub fn account(equity: f64) -> AccountSnapshot {
    AccountSnapshot {
        equity,
        balance: equity,
        open_trade_risk_percent: 0.0,
    }
}

pub fn position(
    ticket: u64,
    side: Side,
    open_time: NaiveDateTime,
    open_price: f64,
    stop_loss: f64,
) -> OpenPositionView {
    OpenPositionView {
        ticket,
        side,
        open_time,
        open_price,
        stop_loss,
        take_profit: 0.0,
        lots: 0.1,
        is_open: true,
        profit: 0.0,
    }
}

/// Write every non-empty series of `set` as `<timeframe>.csv` under `dir`.
pub fn write_bar_dir(dir: &Path, set: &TimeframeSet) {
    for timeframe in Timeframe::ALL {
        let series = set.get(timeframe);
        if series.is_empty() {
            continue;
        }
        let mut csv = String::from("time,open,high,low,close,volume\n");
        for bar in series.iter() {
            writeln!(
                csv,
                "{},{},{},{},{},{}",
                bar.time.format("%Y-%m-%d %H:%M:%S"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            )
            .unwrap();
        }
        std::fs::write(dir.join(format!("{}.csv", timeframe.name())), csv).unwrap();
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
