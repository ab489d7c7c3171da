//! Mmap-backed bar storage: an in-memory writer that buffers bars per
//! timeframe and periodically rewrites whole files, and a read-only store
//! that memory-maps every bar file in a directory for random access.
//!
//! Only time-interval bars are persisted in this format; other bar types
//! have no defined filename pattern and are skipped with a warning.

pub mod error;
pub mod record;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use error::BarStoreError;
use memmap2::Mmap;

use crate::bars::bar::{Bar, BarType, TimeframeId};
use crate::time::TimePoint;
use record::{decode_bar, encode_bar, RECORD_SIZE};

fn time_interval_filename(interval_ns: u64) -> String {
    format!("bars_{}s.bin", interval_ns / 1_000_000_000)
}

fn io_err(path: &Path, source: std::io::Error) -> BarStoreError {
    BarStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Buffers bars per [`TimeframeId`] and flushes them to whole-file
/// rewrites of `bars_{seconds}s.bin` under a configured directory.
pub struct BarWriter {
    dir: PathBuf,
    pending: HashMap<TimeframeId, Vec<Bar>>,
}

impl BarWriter {
    /// Creates a writer persisting under `dir` (created if missing).
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BarStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self {
            dir,
            pending: HashMap::new(),
        })
    }

    /// Buffers `bar` for `timeframe`; not yet visible on disk until
    /// [`Self::flush`].
    pub fn push(&mut self, timeframe: TimeframeId, bar: Bar) {
        self.pending.entry(timeframe).or_default().push(bar);
    }

    /// Appends every buffered bar to its timeframe's file, rewriting the
    /// whole file (open, truncate, write) so a reader never observes a
    /// partially written record set. Clears all buffers on success.
    pub fn flush(&mut self) -> Result<(), BarStoreError> {
        for (tf, bars) in &self.pending {
            if bars.is_empty() {
                continue;
            }
            if tf.bar_type != BarType::Time {
                tracing::warn!(?tf, "bar type has no persisted file format, dropping buffered bars");
                continue;
            }
            let path = self.dir.join(time_interval_filename(tf.param));
            let mut existing = read_all_records(&path)?;
            existing.extend(bars.iter().copied());

            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| io_err(&path, e))?;
            file.write_all(&(existing.len() as u64).to_le_bytes())
                .map_err(|e| io_err(&path, e))?;
            for bar in &existing {
                file.write_all(&encode_bar(bar)).map_err(|e| io_err(&path, e))?;
            }
            file.flush().map_err(|e| io_err(&path, e))?;
            tracing::debug!(path = %path.display(), count = existing.len(), "bar file flushed");
        }
        self.pending.clear();
        Ok(())
    }
}

impl Drop for BarWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "bar writer flush on drop failed");
        }
    }
}

fn read_all_records(path: &Path) -> Result<Vec<Bar>, BarStoreError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path, e)),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| io_err(path, e))?;
    decode_all(path, &bytes)
}

fn decode_all(path: &Path, bytes: &[u8]) -> Result<Vec<Bar>, BarStoreError> {
    if bytes.len() < 8 {
        return Err(BarStoreError::Format {
            path: path.to_path_buf(),
            reason: "file shorter than the 8-byte count header".into(),
        });
    }
    let count = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
    let expected = 8 + count * RECORD_SIZE;
    if bytes.len() != expected {
        return Err(BarStoreError::Format {
            path: path.to_path_buf(),
            reason: format!("file size {} does not match expected {expected} for {count} records", bytes.len()),
        });
    }
    let mut bars = Vec::with_capacity(count);
    for i in 0..count {
        let start = 8 + i * RECORD_SIZE;
        let record: [u8; RECORD_SIZE] = bytes[start..start + RECORD_SIZE].try_into().unwrap();
        let bar = decode_bar(&record).ok_or_else(|| BarStoreError::CorruptEntry {
            path: path.to_path_buf(),
            index: i,
        })?;
        bars.push(bar);
    }
    Ok(bars)
}

/// Binary search mode for [`BarStore::find_bar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    /// The record whose `end_time` exactly equals the query time.
    Exact,
    /// The last record with `end_time < t`.
    Before,
    /// The first record with `end_time >= t`.
    After,
}

struct MappedTimeframe {
    mmap: Mmap,
    count: usize,
}

impl MappedTimeframe {
    fn record(&self, index: usize) -> Option<Bar> {
        if index >= self.count {
            return None;
        }
        let start = 8 + index * RECORD_SIZE;
        let record: [u8; RECORD_SIZE] = self.mmap[start..start + RECORD_SIZE].try_into().ok()?;
        decode_bar(&record)
    }
}

/// Read-only, memory-mapped view over every `bars_*s.bin` file found in a
/// directory, with per-timeframe random access by index or timestamp.
pub struct BarStore {
    timeframes: HashMap<TimeframeId, MappedTimeframe>,
}

impl BarStore {
    /// Opens every `bars_*s.bin` file directly under `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, BarStoreError> {
        let dir = dir.as_ref();
        let mut timeframes = HashMap::new();
        let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(dir, e))?;
            let path = entry.path();
            let Some(seconds) = parse_time_bar_filename(&path) else {
                continue;
            };
            let file = File::open(&path).map_err(|e| io_err(&path, e))?;
            let file_len = file.metadata().map_err(|e| io_err(&path, e))?.len() as usize;
            if file_len < 8 {
                return Err(BarStoreError::Format {
                    path: path.clone(),
                    reason: "file shorter than the 8-byte count header".into(),
                });
            }
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_err(&path, e))?;
            let count = u64::from_le_bytes(mmap[0..8].try_into().unwrap()) as usize;
            let expected = 8 + count * RECORD_SIZE;
            if file_len != expected {
                return Err(BarStoreError::Format {
                    path: path.clone(),
                    reason: format!("file size {file_len} does not match expected {expected} for {count} records"),
                });
            }
            let tf = TimeframeId {
                bar_type: BarType::Time,
                param: seconds * 1_000_000_000,
            };
            timeframes.insert(tf, MappedTimeframe { mmap, count });
        }
        Ok(Self { timeframes })
    }

    /// Number of bars stored for `timeframe`, or zero if not present.
    #[must_use]
    pub fn len(&self, timeframe: TimeframeId) -> usize {
        self.timeframes.get(&timeframe).map_or(0, |t| t.count)
    }

    /// `true` iff `timeframe` has no bars on disk.
    #[must_use]
    pub fn is_empty(&self, timeframe: TimeframeId) -> bool {
        self.len(timeframe) == 0
    }

    /// The bar at `index` (0 = oldest on disk) for `timeframe`.
    #[must_use]
    pub fn get(&self, timeframe: TimeframeId, index: usize) -> Option<Bar> {
        self.timeframes.get(&timeframe)?.record(index)
    }

    /// Binary-searches `timeframe`'s bars by `end_time` according to
    /// `mode`.
    #[must_use]
    pub fn find_bar(&self, timeframe: TimeframeId, time: TimePoint, mode: FindMode) -> Option<Bar> {
        let mapped = self.timeframes.get(&timeframe)?;
        if mapped.count == 0 {
            return None;
        }
        let (mut lo, mut hi) = (0usize, mapped.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let end_time = mapped.record(mid)?.end_time;
            if end_time < time {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        match mode {
            FindMode::After => mapped.record(lo),
            FindMode::Exact => mapped.record(lo).filter(|b| b.end_time == time),
            FindMode::Before => lo.checked_sub(1).and_then(|i| mapped.record(i)),
        }
    }
}

fn parse_time_bar_filename(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stripped = name.strip_prefix("bars_")?.strip_suffix("s.bin")?;
    stripped.parse::<u64>().ok()
}

/// Line-oriented `.symbol_metadata` sidecar file (`key=value` per line).
/// Unknown keys already present in the file are preserved across writes.
pub struct SymbolMetadata {
    path: PathBuf,
}

impl SymbolMetadata {
    /// Points at the metadata file at `path` (not required to exist yet).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the current key=value pairs, or an empty map if the file
    /// doesn't exist yet.
    pub fn read(&self) -> Result<HashMap<String, String>, BarStoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        Ok(contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    /// Merges `updates` into the existing file's contents (unknown
    /// existing keys are preserved) and rewrites it.
    pub fn write_merged(&self, updates: &HashMap<String, String>) -> Result<(), BarStoreError> {
        let mut merged = self.read()?;
        merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
        let mut lines: Vec<String> = merged.iter().map(|(k, v)| format!("{k}={v}")).collect();
        lines.sort();
        std::fs::write(&self.path, lines.join("\n") + "\n").map_err(|e| io_err(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::bar::BarCloseReason;
    use crate::decimal::{Price, Volume};

    fn bar(end_ns: i64) -> Bar {
        Bar {
            open: Price::from_f64(100.0),
            high: Price::from_f64(100.0),
            low: Price::from_f64(100.0),
            close: Price::from_f64(100.0),
            volume: Volume::from_f64(1.0),
            buy_volume: Volume::from_f64(1.0),
            trade_count: 1,
            start_time: TimePoint::from_unix_ns(end_ns - 1),
            end_time: TimePoint::from_unix_ns(end_ns),
            close_reason: BarCloseReason::Threshold,
        }
    }

    #[test]
    fn writer_then_reader_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tf = TimeframeId {
            bar_type: BarType::Time,
            param: 1_000_000_000,
        };
        {
            let mut writer = BarWriter::new(dir.path()).unwrap();
            writer.push(tf, bar(1_000_000_000));
            writer.push(tf, bar(2_000_000_000));
            writer.flush().unwrap();
        }
        let store = BarStore::open(dir.path()).unwrap();
        assert_eq!(store.len(tf), 2);
        assert_eq!(store.get(tf, 0), Some(bar(1_000_000_000)));
        assert_eq!(store.get(tf, 1), Some(bar(2_000_000_000)));
    }

    #[test]
    fn flush_appends_across_multiple_writer_instances() {
        let dir = tempfile::tempdir().unwrap();
        let tf = TimeframeId {
            bar_type: BarType::Time,
            param: 1_000_000_000,
        };
        {
            let mut writer = BarWriter::new(dir.path()).unwrap();
            writer.push(tf, bar(1_000_000_000));
            writer.flush().unwrap();
        }
        {
            let mut writer = BarWriter::new(dir.path()).unwrap();
            writer.push(tf, bar(2_000_000_000));
            writer.flush().unwrap();
        }
        let store = BarStore::open(dir.path()).unwrap();
        assert_eq!(store.len(tf), 2);
    }

    #[test]
    fn find_bar_modes_match_expected_records() {
        let dir = tempfile::tempdir().unwrap();
        let tf = TimeframeId {
            bar_type: BarType::Time,
            param: 1_000_000_000,
        };
        {
            let mut writer = BarWriter::new(dir.path()).unwrap();
            for end in [1_000, 2_000, 3_000] {
                writer.push(tf, bar(end));
            }
            writer.flush().unwrap();
        }
        let store = BarStore::open(dir.path()).unwrap();
        assert_eq!(
            store.find_bar(tf, TimePoint::from_unix_ns(2_000), FindMode::Exact),
            Some(bar(2_000))
        );
        assert_eq!(
            store.find_bar(tf, TimePoint::from_unix_ns(2_500), FindMode::Before),
            Some(bar(2_000))
        );
        assert_eq!(
            store.find_bar(tf, TimePoint::from_unix_ns(2_500), FindMode::After),
            Some(bar(3_000))
        );
    }

    #[test]
    fn symbol_metadata_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let meta = SymbolMetadata::new(dir.path().join(".symbol_metadata"));
        std::fs::write(dir.path().join(".symbol_metadata"), "legacy=1\n").unwrap();
        let mut updates = HashMap::new();
        updates.insert("tick_size".to_string(), "0.1".to_string());
        meta.write_merged(&updates).unwrap();
        let read_back = meta.read().unwrap();
        assert_eq!(read_back.get("legacy"), Some(&"1".to_string()));
        assert_eq!(read_back.get("tick_size"), Some(&"0.1".to_string()));
    }
}
