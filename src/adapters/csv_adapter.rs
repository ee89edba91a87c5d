//! CSV bar and position files.
//!
//! A bar directory holds one file per timeframe named after it
//! (`primary.csv`, `secondary.csv`, `hourly.csv`, `four_hourly.csv`,
//! `daily.csv`, `weekly.csv`, `monthly.csv`) with the header
//! `time,open,high,low,close,volume`. Only `primary.csv` is required.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::bar_series::{BarSeries, Timeframe, TimeframeSet};
use crate::domain::error::PhasetraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::{OpenPositionView, Side};

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M",
];

#[derive(Debug, Deserialize)]
struct BarRecord {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    ticket: u64,
    side: String,
    open_time: String,
    open_price: f64,
    #[serde(default)]
    stop_loss: f64,
    #[serde(default)]
    take_profit: f64,
    lots: f64,
    #[serde(default = "default_open")]
    is_open: bool,
    #[serde(default)]
    profit: f64,
}

fn default_open() -> bool {
    true
}

fn parse_error(path: &Path, reason: impl Into<String>) -> PhasetraderError {
    PhasetraderError::DataParse {
        file: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Timestamps with or without seconds; a bare date means midnight.
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn read_records<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, PhasetraderError> {
    let content = fs::read_to_string(path)
        .map_err(|e| parse_error(path, format!("failed to read: {e}")))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    reader
        .deserialize()
        .enumerate()
        .map(|(row, record)| {
            record.map_err(|e| parse_error(path, format!("row {}: {e}", row + 1)))
        })
        .collect()
}

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}.csv", timeframe.name()))
    }

    pub fn load_series(
        &self,
        timeframe: Timeframe,
        capacity: usize,
    ) -> Result<BarSeries, PhasetraderError> {
        let path = self.csv_path(timeframe);
        let records: Vec<BarRecord> = read_records(&path)?;
        let mut bars = Vec::with_capacity(records.len());
        for record in records {
            let time = parse_time(&record.time)
                .ok_or_else(|| parse_error(&path, format!("invalid time '{}'", record.time)))?;
            if record.high < record.low {
                return Err(parse_error(&path, format!("high below low at {time}")));
            }
            bars.push(Bar {
                time,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }
        BarSeries::from_bars(timeframe, capacity, bars)
    }

    /// Every timeframe file present in the directory. `primary.csv` must
    /// exist.
    pub fn load(&self, capacity: usize) -> Result<TimeframeSet, PhasetraderError> {
        let mut set = TimeframeSet::new(capacity);
        for timeframe in Timeframe::ALL {
            let path = self.csv_path(timeframe);
            if timeframe != Timeframe::Primary && !path.exists() {
                debug!(timeframe = %timeframe, "no bar file, series left empty");
                continue;
            }
            let series = self.load_series(timeframe, capacity)?;
            debug!(timeframe = %timeframe, bars = series.len(), "bars loaded");
            set.replace(series);
        }
        info!(path = %self.base_path.display(), "timeframe set loaded");
        Ok(set)
    }
}

/// Positions with header
/// `ticket,side,open_time,open_price,stop_loss,take_profit,lots,is_open,profit`.
pub fn load_positions(path: &Path) -> Result<Vec<OpenPositionView>, PhasetraderError> {
    let records: Vec<PositionRecord> = read_records(path)?;
    records
        .into_iter()
        .map(|r| {
            let side = Side::from_name(&r.side)
                .ok_or_else(|| parse_error(path, format!("unknown side '{}'", r.side)))?;
            let open_time = parse_time(&r.open_time)
                .ok_or_else(|| parse_error(path, format!("invalid time '{}'", r.open_time)))?;
            Ok(OpenPositionView {
                ticket: r.ticket,
                side,
                open_time,
                open_price: r.open_price,
                stop_loss: r.stop_loss,
                take_profit: r.take_profit,
                lots: r.lots,
                is_open: r.is_open,
                profit: r.profit,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parse_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(parse_time("2024-03-05 10:15:00"), Some(expected));
        assert_eq!(parse_time("2024-03-05T10:15:00"), Some(expected));
        assert_eq!(parse_time("2024-03-05 10:15"), Some(expected));
        assert_eq!(parse_time("2024.03.05 10:15"), Some(expected));
        assert_eq!(
            parse_time("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_time("yesterday"), None);
    }

    #[test]
    fn loads_present_timeframes() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "primary.csv",
            "time,open,high,low,close,volume\n\
             2024-03-05 10:00,1.1,1.2,1.0,1.15,10\n\
             2024-03-05 10:15,1.15,1.25,1.1,1.2,12\n",
        );
        write(
            &dir,
            "daily.csv",
            "time,open,high,low,close,volume\n2024-03-04,1.0,1.3,0.9,1.1,100\n",
        );
        let set = CsvBarAdapter::new(dir.path()).load(100).unwrap();
        assert_eq!(set.get(Timeframe::Primary).len(), 2);
        assert_eq!(set.get(Timeframe::Daily).len(), 1);
        assert!(set.get(Timeframe::Weekly).is_empty());
        assert_eq!(set.get(Timeframe::Primary).latest().unwrap().close, 1.2);
    }

    #[test]
    fn volume_column_is_optional() {
        let dir = TempDir::new().unwrap();
        write(&dir, "primary.csv", "time,open,high,low,close\n2024-03-05 10:00,1,2,0.5,1.5\n");
        let set = CsvBarAdapter::new(dir.path()).load(10).unwrap();
        assert_eq!(set.get(Timeframe::Primary).latest().unwrap().volume, 0.0);
    }

    #[test]
    fn primary_file_is_required() {
        let dir = TempDir::new().unwrap();
        let err = CsvBarAdapter::new(dir.path()).load(10).unwrap_err();
        assert!(matches!(err, PhasetraderError::DataParse { .. }));
    }

    #[test]
    fn out_of_order_bars_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "primary.csv",
            "time,open,high,low,close,volume\n\
             2024-03-05 10:15,1,2,0.5,1.5,1\n\
             2024-03-05 10:00,1,2,0.5,1.5,1\n",
        );
        let err = CsvBarAdapter::new(dir.path()).load(10).unwrap_err();
        assert!(matches!(err, PhasetraderError::BarOutOfOrder { .. }));
    }

    #[test]
    fn bad_number_reports_row() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "primary.csv",
            "time,open,high,low,close,volume\n2024-03-05 10:00,1,abc,0.5,1.5,1\n",
        );
        let err = CsvBarAdapter::new(dir.path()).load(10).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn positions_load_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "positions.csv",
            "ticket,side,open_time,open_price,stop_loss,take_profit,lots,is_open,profit\n\
             7,buy,2024-03-05 09:00,1.1,1.09,0,0.5,true,12.5\n\
             8,short,2024-03-04 09:00,1.2,1.21,1.18,0.2,false,-3\n",
        );
        let positions = load_positions(&path).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].side, Side::Buy);
        assert!(!positions[0].has_take_profit());
        assert_eq!(positions[1].side, Side::Sell);
        assert!(!positions[1].is_open);
    }

    #[test]
    fn unknown_side_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "positions.csv",
            "ticket,side,open_time,open_price,lots\n1,hold,2024-03-05 09:00,1.1,0.1\n",
        );
        assert!(load_positions(&path).is_err());
    }
}
