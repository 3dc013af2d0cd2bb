//! Memory sampler.
//!
//! Usage is sampled every tick; the top-process scan walks every live process
//! and is throttled to once per scan interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::history::HistoryAggregator;
use super::metrics::{estimate_used_ram, MemoryMetrics};
use super::task::PollTask;
use crate::error::{MonitorError, Result};

pub const DEFAULT_PROCESS_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Shown before the first successful process scan.
pub const NO_PROCESS: &str = "N/A";

/// Query interface shared by every memory backend
pub trait MemoryMonitor: Send + Sync {
    /// Physical memory in use, in percent.
    fn total_usage(&self) -> f32;

    /// Available physical memory in MB.
    fn remaining_ram(&self) -> f32;

    /// Mean usage over the history window.
    fn average_usage(&self) -> f32;

    /// Largest resident process as `"name (123.45 MB)"`.
    fn top_consuming_process(&self) -> String;

    fn snapshot(&self) -> MemoryMetrics {
        let usage = self.total_usage();
        let remaining = self.remaining_ram();
        MemoryMetrics {
            total_usage_percent: usage,
            remaining_ram_mb: remaining,
            used_ram_mb: estimate_used_ram(remaining, usage),
            average_usage_percent: self.average_usage(),
            top_process: self.top_consuming_process(),
        }
    }
}

/// Physical memory totals in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStatus {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemoryStatus {
    pub fn usage_percent(&self) -> Result<f32> {
        if self.total_kb == 0 {
            return Err(MonitorError::partial_data("total memory reported as 0"));
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        let usage = used as f64 / self.total_kb as f64 * 100.0;
        Ok(usage.clamp(0.0, 100.0) as f32)
    }

    pub fn remaining_mb(&self) -> f32 {
        (self.available_kb as f64 / 1024.0) as f32
    }
}

/// One process seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMemory {
    pub name: String,
    pub rss_kb: u64,
}

/// Platform adapter the sampler thread reads from.
pub trait MemorySource: Send {
    fn read_status(&mut self) -> Result<MemoryStatus>;

    /// Every live process with a name and non-zero RSS, in scan order.
    fn scan_processes(&mut self) -> Result<Vec<ProcessMemory>>;
}

/// Process name to RSS map built by one scan.
///
/// Same-named processes collapse onto the last one seen. The encounter order is
/// kept so that RSS ties resolve to the process scanned last.
#[derive(Debug, Clone, Default)]
pub struct ProcessMemoryRecord {
    entries: HashMap<String, (u64, u64)>,
    next_seq: u64,
}

impl ProcessMemoryRecord {
    pub fn from_scan(processes: Vec<ProcessMemory>) -> Self {
        let mut record = Self::default();
        for process in processes {
            record.insert(process.name, process.rss_kb);
        }
        record
    }

    pub fn insert(&mut self, name: String, rss_kb: u64) {
        self.entries.insert(name, (rss_kb, self.next_seq));
        self.next_seq += 1;
    }

    /// Largest RSS; ties go to the later insertion.
    pub fn top(&self) -> Option<ProcessMemory> {
        self.entries
            .iter()
            .max_by_key(|(_, entry)| **entry)
            .map(|(name, &(rss_kb, _))| ProcessMemory {
                name: name.clone(),
                rss_kb,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `"name (123.45 MB)"`
pub fn format_top_process(process: &ProcessMemory) -> String {
    format!("{} ({:.2} MB)", process.name, process.rss_kb as f64 / 1024.0)
}

#[derive(Debug, Clone)]
struct MemoryReadings {
    current: f32,
    remaining_mb: f32,
    history: HistoryAggregator,
    top_process: String,
}

/// Tick logic, owned by the sampler thread.
pub struct MemoryTracker {
    source: Box<dyn MemorySource>,
    scan_interval: Duration,
    last_scan: Option<Instant>,
    readings: Arc<Mutex<MemoryReadings>>,
}

impl MemoryTracker {
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Take one sample as if the clock read `now`.
    pub fn tick_at(&mut self, now: Instant) {
        self.sample_usage();
        self.refresh_top_process(now);
    }

    fn sample_usage(&mut self) {
        let sample = self
            .source
            .read_status()
            .and_then(|status| Ok((status.usage_percent()?, status.remaining_mb())));

        let mut readings = self.readings.lock();
        match sample {
            Ok((usage, remaining_mb)) => {
                readings.current = usage;
                readings.remaining_mb = remaining_mb;
                readings.history.record(usage);
            }
            Err(e) => {
                readings.current = 0.0;
                readings.remaining_mb = 0.0;
                drop(readings);
                log::warn!("Failed to read memory status: {}", e);
            }
        }
    }

    /// Rescan processes unless the last scan attempt is younger than the
    /// interval. Returns whether a scan was attempted. A failed scan keeps the
    /// previous top process.
    pub fn refresh_top_process(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_scan {
            if now.saturating_duration_since(last) < self.scan_interval {
                log::trace!("Using cached process memory usage");
                return false;
            }
        }

        // a failed scan still counts against the interval
        self.last_scan = Some(now);
        let processes = match self.source.scan_processes() {
            Ok(processes) => processes,
            Err(e) => {
                log::warn!("Failed to scan process memory usage: {}", e);
                return true;
            }
        };

        let record = ProcessMemoryRecord::from_scan(processes);
        let top = match record.top() {
            Some(process) => format_top_process(&process),
            None => {
                log::debug!("Process scan found no resident processes");
                NO_PROCESS.to_string()
            }
        };

        log::debug!("Top memory process: {} ({} scanned)", top, record.len());
        self.readings.lock().top_process = top;
        true
    }
}

/// Memory sampler backed by a platform `MemorySource`.
pub struct MemorySampler {
    readings: Arc<Mutex<MemoryReadings>>,
    task: Option<PollTask>,
}

impl MemorySampler {
    /// Take a first sample right away, then keep ticking every `period`.
    pub fn start(
        source: Box<dyn MemorySource>,
        period: Duration,
        history_capacity: usize,
        scan_interval: Duration,
    ) -> Result<Self> {
        let (mut sampler, mut tracker) = Self::manual(source, history_capacity, scan_interval);
        tracker.tick();
        sampler.task = Some(PollTask::start("resmon-memory", period, move || {
            tracker.tick();
        })?);
        Ok(sampler)
    }

    /// Sampler without a background thread; the caller drives the ticks.
    pub fn manual(
        source: Box<dyn MemorySource>,
        history_capacity: usize,
        scan_interval: Duration,
    ) -> (Self, MemoryTracker) {
        let readings = Arc::new(Mutex::new(MemoryReadings {
            current: 0.0,
            remaining_mb: 0.0,
            history: HistoryAggregator::with_capacity(history_capacity),
            top_process: NO_PROCESS.to_string(),
        }));

        let tracker = MemoryTracker {
            source,
            scan_interval,
            last_scan: None,
            readings: readings.clone(),
        };

        (
            Self {
                readings,
                task: None,
            },
            tracker,
        )
    }

    pub fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.stop();
        }
    }

    pub fn history_len(&self) -> usize {
        self.readings.lock().history.len()
    }
}

impl MemoryMonitor for MemorySampler {
    fn total_usage(&self) -> f32 {
        self.readings.lock().current
    }

    fn remaining_ram(&self) -> f32 {
        self.readings.lock().remaining_mb
    }

    fn average_usage(&self) -> f32 {
        self.readings.lock().history.average()
    }

    fn top_consuming_process(&self) -> String {
        self.readings.lock().top_process.clone()
    }

    fn snapshot(&self) -> MemoryMetrics {
        let readings = self.readings.lock();
        MemoryMetrics {
            total_usage_percent: readings.current,
            remaining_ram_mb: readings.remaining_mb,
            used_ram_mb: estimate_used_ram(readings.remaining_mb, readings.current),
            average_usage_percent: readings.history.average(),
            top_process: readings.top_process.clone(),
        }
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        self.stop();
    }
}
