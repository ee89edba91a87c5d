//! Counter store backed by one CSV row per instance.
//!
//! Layout: `{dir}/counters_{instance}.csv`, guarded during a session by an
//! exclusive OS lock on `{dir}/counters_{instance}.lock`. The lock file stays
//! on disk; the lock itself dies with the session or the process, so a crash
//! never wedges the instance. Writes go to a `.tmp` file that is then renamed
//! into place, so readers never see a partial record.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::csv_adapter::parse_time;
use crate::domain::counters::{PendingSignal, PersistedCounters, TurningPoint};
use crate::domain::error::PhasetraderError;
use crate::domain::position::Side;
use crate::ports::counter_port::{CounterSession, CounterStore};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct CounterRecord {
    rate_error_count: u32,
    pending_side: Option<String>,
    pending_time: Option<String>,
    turning_side: Option<String>,
    is_turning: bool,
}

impl From<&PersistedCounters> for CounterRecord {
    fn from(c: &PersistedCounters) -> Self {
        Self {
            rate_error_count: c.rate_error_count,
            pending_side: c.pending_signal.map(|s| s.side.name().to_string()),
            pending_time: c
                .pending_signal
                .map(|s| s.time.format(TIME_FORMAT).to_string()),
            turning_side: c.turning_point.side.map(|s| s.name().to_string()),
            is_turning: c.turning_point.is_turning,
        }
    }
}

impl CounterRecord {
    fn into_counters(self) -> Result<PersistedCounters, String> {
        let side = |name: Option<String>| -> Result<Option<Side>, String> {
            name.map(|n| Side::from_name(&n).ok_or(format!("unknown side '{n}'")))
                .transpose()
        };
        let pending_signal = match (side(self.pending_side)?, self.pending_time) {
            (Some(side), Some(time)) => {
                let time: NaiveDateTime =
                    parse_time(&time).ok_or(format!("invalid pending time '{time}'"))?;
                Some(PendingSignal { side, time })
            }
            _ => None,
        };
        Ok(PersistedCounters {
            rate_error_count: self.rate_error_count,
            pending_signal,
            turning_point: TurningPoint {
                side: side(self.turning_side)?,
                is_turning: self.is_turning,
            },
        })
    }
}

pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn data_path(&self, instance_id: u32) -> PathBuf {
        self.dir.join(format!("counters_{instance_id}.csv"))
    }

    fn lock_path(&self, instance_id: u32) -> PathBuf {
        self.dir.join(format!("counters_{instance_id}.lock"))
    }

    fn read(path: &Path, instance_id: u32) -> Result<PersistedCounters, PhasetraderError> {
        let store_error = |reason: String| PhasetraderError::CounterStore {
            instance_id,
            reason,
        };
        if !path.exists() {
            return Ok(PersistedCounters::default());
        }
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| store_error(format!("failed to open {}: {e}", path.display())))?;
        match reader.deserialize::<CounterRecord>().next() {
            Some(record) => record
                .map_err(|e| store_error(format!("corrupt record: {e}")))?
                .into_counters()
                .map_err(store_error),
            None => Ok(PersistedCounters::default()),
        }
    }
}

impl CounterStore for FileCounterStore {
    fn open(&self, instance_id: u32) -> Result<Box<dyn CounterSession + '_>, PhasetraderError> {
        fs::create_dir_all(&self.dir)?;
        let lock_path = self.lock_path(instance_id);
        let lock_error = |reason: String| PhasetraderError::CounterStore {
            instance_id,
            reason: format!("cannot lock {}: {reason}", lock_path.display()),
        };
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| lock_error(e.to_string()))?;
        lock.try_lock().map_err(|e| match e {
            TryLockError::WouldBlock => lock_error("held by another session".to_string()),
            TryLockError::Error(e) => lock_error(e.to_string()),
        })?;

        // Dropping `lock` on a failed read releases it.
        let path = self.data_path(instance_id);
        let counters = Self::read(&path, instance_id)?;
        debug!(instance = instance_id, ?counters, "counters loaded");
        Ok(Box::new(FileCounterSession {
            instance_id,
            path,
            _lock: lock,
            counters,
        }))
    }
}

struct FileCounterSession {
    instance_id: u32,
    path: PathBuf,
    /// Holds the exclusive lock until the session is dropped.
    _lock: File,
    counters: PersistedCounters,
}

impl FileCounterSession {
    fn write(&self, counters: &PersistedCounters) -> Result<(), PhasetraderError> {
        let store_error = |reason: String| PhasetraderError::CounterStore {
            instance_id: self.instance_id,
            reason,
        };
        let tmp_path = self.path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp_path)
            .map_err(|e| store_error(format!("failed to create {}: {e}", tmp_path.display())))?;
        writer
            .serialize(CounterRecord::from(counters))
            .map_err(|e| store_error(format!("failed to write record: {e}")))?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            store_error(format!("atomic rename failed: {e}"))
        })
    }
}

impl CounterSession for FileCounterSession {
    fn counters(&self) -> &PersistedCounters {
        &self.counters
    }

    fn commit(self: Box<Self>, counters: &PersistedCounters) -> Result<(), PhasetraderError> {
        self.write(counters)?;
        debug!(instance = self.instance_id, ?counters, "counters committed");
        Ok(())
    }
}
