//! CPU sampler.
//!
//! Usage is computed from the difference between two readings of the
//! cumulative idle/total CPU time counters, one reading per tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::history::HistoryAggregator;
use super::metrics::CpuMetrics;
use super::task::PollTask;
use crate::error::Result;

/// Query interface shared by every CPU backend
pub trait CpuMonitor: Send + Sync {
    /// Usage over the last completed tick, in percent.
    fn total_usage(&self) -> f32;

    /// Current clock frequency in GHz.
    fn clock_frequency(&self) -> f32;

    /// Threads owned by this process.
    fn used_threads(&self) -> u32;

    /// System-wide thread capacity as reported by the backend.
    fn total_threads(&self) -> u32;

    /// Highest usage seen this session.
    fn highest_usage(&self) -> f32;

    /// Mean usage over the history window.
    fn average_usage(&self) -> f32;

    fn snapshot(&self) -> CpuMetrics {
        CpuMetrics {
            total_usage_percent: self.total_usage(),
            clock_frequency_ghz: self.clock_frequency(),
            used_threads: self.used_threads(),
            total_threads: self.total_threads(),
            highest_usage_percent: self.highest_usage(),
            average_usage_percent: self.average_usage(),
        }
    }
}

/// Cumulative CPU time counters, in whatever unit the platform reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Platform adapter the sampler thread reads from.
pub trait CpuSource: Send {
    fn read_times(&mut self) -> Result<CpuTimes>;

    fn clock_frequency_ghz(&mut self) -> Result<f32>;

    fn used_threads(&mut self) -> Result<u32>;

    fn total_threads(&mut self) -> Result<u32>;
}

/// Usage percentage between two readings.
///
/// `None` when no CPU time elapsed or a counter went backwards.
pub fn usage_between(previous: CpuTimes, current: CpuTimes) -> Option<f32> {
    let delta_total = current.total.checked_sub(previous.total)?;
    if delta_total == 0 {
        return None;
    }
    let delta_idle = current.idle.checked_sub(previous.idle)?;
    let busy = delta_total.saturating_sub(delta_idle);

    let usage = busy as f64 / delta_total as f64 * 100.0;
    Some(usage.clamp(0.0, 100.0) as f32)
}

#[derive(Debug, Clone, Default)]
struct CpuReadings {
    current: f32,
    frequency_ghz: f32,
    used_threads: u32,
    total_threads: u32,
    history: HistoryAggregator,
}

/// Tick logic, owned by the sampler thread.
pub struct CpuTracker {
    source: Box<dyn CpuSource>,
    baseline: Option<CpuTimes>,
    readings: Arc<Mutex<CpuReadings>>,
}

impl CpuTracker {
    fn new(mut source: Box<dyn CpuSource>, readings: Arc<Mutex<CpuReadings>>) -> Self {
        let baseline = match source.read_times() {
            Ok(times) => Some(times),
            Err(e) => {
                log::warn!("Initial CPU time read failed: {}", e);
                None
            }
        };

        Self {
            source,
            baseline,
            readings,
        }
    }

    /// Take one sample. Returns the usage recorded. A skipped tick reports 0
    /// and leaves history alone.
    pub fn tick(&mut self) -> f32 {
        let frequency_ghz = self.source.clock_frequency_ghz().unwrap_or_else(|e| {
            log::debug!("CPU frequency unavailable: {}", e);
            0.0
        });
        let used_threads = self.source.used_threads().unwrap_or_else(|e| {
            log::debug!("Process thread count unavailable: {}", e);
            0
        });
        let total_threads = self.source.total_threads().unwrap_or_else(|e| {
            log::debug!("System thread count unavailable: {}", e);
            0
        });

        let usage = match self.source.read_times() {
            Ok(times) => {
                let usage = self
                    .baseline
                    .and_then(|previous| usage_between(previous, times));
                self.baseline = Some(times);
                usage
            }
            Err(e) => {
                log::warn!("Failed to read CPU times: {}", e);
                None
            }
        };

        let mut readings = self.readings.lock();
        readings.frequency_ghz = frequency_ghz;
        readings.used_threads = used_threads;
        readings.total_threads = total_threads;

        match usage {
            Some(usage) => {
                readings.current = usage;
                readings.history.record(usage);
                usage
            }
            None => {
                log::debug!("No CPU time delta this tick; reporting 0");
                readings.current = 0.0;
                0.0
            }
        }
    }
}

/// CPU sampler backed by a platform `CpuSource`.
pub struct CpuSampler {
    readings: Arc<Mutex<CpuReadings>>,
    task: Option<PollTask>,
}

impl CpuSampler {
    /// Prime the baseline and start ticking every `period`.
    pub fn start(
        source: Box<dyn CpuSource>,
        period: Duration,
        history_capacity: usize,
    ) -> Result<Self> {
        let (mut sampler, mut tracker) = Self::manual(source, history_capacity);
        sampler.task = Some(PollTask::start("resmon-cpu", period, move || {
            tracker.tick();
        })?);
        Ok(sampler)
    }

    /// Sampler without a background thread; the caller drives the ticks.
    pub fn manual(source: Box<dyn CpuSource>, history_capacity: usize) -> (Self, CpuTracker) {
        let readings = Arc::new(Mutex::new(CpuReadings {
            history: HistoryAggregator::with_capacity(history_capacity),
            ..Default::default()
        }));
        let tracker = CpuTracker::new(source, readings.clone());

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

    /// Number of samples currently in the history window.
    pub fn history_len(&self) -> usize {
        self.readings.lock().history.len()
    }
}

impl CpuMonitor for CpuSampler {
    fn total_usage(&self) -> f32 {
        self.readings.lock().current
    }

    fn clock_frequency(&self) -> f32 {
        self.readings.lock().frequency_ghz
    }

    fn used_threads(&self) -> u32 {
        self.readings.lock().used_threads
    }

    fn total_threads(&self) -> u32 {
        self.readings.lock().total_threads
    }

    fn highest_usage(&self) -> f32 {
        self.readings.lock().history.highest()
    }

    fn average_usage(&self) -> f32 {
        self.readings.lock().history.average()
    }

    fn snapshot(&self) -> CpuMetrics {
        let readings = self.readings.lock();
        CpuMetrics {
            total_usage_percent: readings.current,
            clock_frequency_ghz: readings.frequency_ghz,
            used_threads: readings.used_threads,
            total_threads: readings.total_threads,
            highest_usage_percent: readings.history.highest(),
            average_usage_percent: readings.history.average(),
        }
    }
}

impl Drop for CpuSampler {
    fn drop(&mut self) {
        self.stop();
    }
}
