//! Throughput from OS-aggregated per-second counters.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{bytes_to_mb_per_sec, LinkCapacity, NetworkMonitor, RateReadings};
use crate::core::metrics::NetworkMetrics;
use crate::core::task::PollTask;
use crate::error::Result;

/// Byte rates summed over every monitored adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub sent_bytes_per_sec: f64,
    pub received_bytes_per_sec: f64,
}

impl Throughput {
    pub fn upload_mb_per_sec(&self) -> f32 {
        bytes_to_mb_per_sec(self.sent_bytes_per_sec)
    }

    pub fn download_mb_per_sec(&self) -> f32 {
        bytes_to_mb_per_sec(self.received_bytes_per_sec)
    }
}

/// Sum per-instance counter values, skipping negative and non-finite ones.
pub fn sum_rates(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .sum()
}

/// OS query returning the current per-second throughput.
pub trait ThroughputCounters: Send {
    fn sample(&mut self) -> Result<Throughput>;
}

/// Rate-thread tick logic.
pub struct CounterTracker {
    counters: Box<dyn ThroughputCounters>,
    capacity: Box<dyn LinkCapacity>,
    readings: Arc<Mutex<RateReadings>>,
}

impl CounterTracker {
    /// Read the counters once. On failure the previous rates are kept.
    pub fn tick(&mut self) -> bool {
        let throughput = match self.counters.sample() {
            Ok(throughput) => throughput,
            Err(e) => {
                log::warn!("Failed to read throughput counters: {}", e);
                return false;
            }
        };

        let bandwidth = self.capacity.capacity_mbps();

        let mut readings = self.readings.lock();
        readings.update(
            throughput.upload_mb_per_sec(),
            throughput.download_mb_per_sec(),
        );
        if let Ok(mbps) = bandwidth {
            readings.bandwidth_mbps = mbps;
        }
        true
    }

    pub fn refresh_capacity(&mut self) {
        match self.capacity.capacity_mbps() {
            Ok(mbps) => self.readings.lock().bandwidth_mbps = mbps,
            Err(e) => log::warn!("Link capacity unavailable: {}", e),
        }
    }
}

/// Counter-based estimator (Windows strategy).
pub struct CounterEstimator {
    readings: Arc<Mutex<RateReadings>>,
    task: Option<PollTask>,
}

impl CounterEstimator {
    pub fn start(
        counters: Box<dyn ThroughputCounters>,
        capacity: Box<dyn LinkCapacity>,
        period: Duration,
    ) -> Result<Self> {
        let (mut estimator, mut tracker) = Self::manual(counters, capacity);
        estimator.task = Some(PollTask::start("resmon-net-counters", period, move || {
            tracker.tick();
        })?);
        Ok(estimator)
    }

    /// Estimator without a background thread; the caller drives the ticks.
    pub fn manual(
        counters: Box<dyn ThroughputCounters>,
        capacity: Box<dyn LinkCapacity>,
    ) -> (Self, CounterTracker) {
        let readings = Arc::new(Mutex::new(RateReadings::default()));
        let mut tracker = CounterTracker {
            counters,
            capacity,
            readings: readings.clone(),
        };
        tracker.refresh_capacity();

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
}

impl NetworkMonitor for CounterEstimator {
    fn total_bandwidth(&self) -> f32 {
        self.readings.lock().bandwidth_mbps
    }

    fn upload_rate(&self) -> f32 {
        self.readings.lock().upload
    }

    fn download_rate(&self) -> f32 {
        self.readings.lock().download
    }

    fn highest_upload_rate(&self) -> f32 {
        self.readings.lock().highest_upload
    }

    fn highest_download_rate(&self) -> f32 {
        self.readings.lock().highest_download
    }

    fn snapshot(&self) -> NetworkMetrics {
        let readings = *self.readings.lock();
        readings.snapshot()
    }
}

impl Drop for CounterEstimator {
    fn drop(&mut self) {
        self.stop();
    }
}
