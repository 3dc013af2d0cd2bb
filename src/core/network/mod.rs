//! Network throughput estimation.
//!
//! Two strategies sit behind [`NetworkMonitor`]:
//! - [`capture::CaptureEstimator`] counts bytes from live packet capture and
//!   windows them into rates itself.
//! - [`counters::CounterEstimator`] reads per-second throughput counters the OS
//!   already aggregates.

pub mod capture;
pub mod counters;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::metrics::NetworkMetrics;
use crate::error::Result;

pub use capture::{CaptureEstimator, Direction, FrameSource, InterfaceIdentity, MacAddress};
pub use counters::{CounterEstimator, Throughput, ThroughputCounters};

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Query interface shared by every network backend
pub trait NetworkMonitor: Send + Sync {
    /// Link capacity in Mbps.
    fn total_bandwidth(&self) -> f32;

    /// Upload rate over the last tick, in MB/s.
    fn upload_rate(&self) -> f32;

    /// Download rate over the last tick, in MB/s.
    fn download_rate(&self) -> f32;

    /// Upload plus download rate, in MB/s.
    fn total_used_bandwidth(&self) -> f32 {
        self.upload_rate() + self.download_rate()
    }

    fn highest_upload_rate(&self) -> f32;

    fn highest_download_rate(&self) -> f32;

    /// Per-process attribution is not implemented by any backend.
    fn top_bandwidth_process(&self) -> TopBandwidth {
        TopBandwidth::NotSupported
    }

    fn snapshot(&self) -> NetworkMetrics {
        NetworkMetrics {
            total_bandwidth_mbps: self.total_bandwidth(),
            upload_mb_per_sec: self.upload_rate(),
            download_mb_per_sec: self.download_rate(),
            total_used_bandwidth: self.total_used_bandwidth(),
            highest_upload_mb_per_sec: self.highest_upload_rate(),
            highest_download_mb_per_sec: self.highest_download_rate(),
            top_bandwidth_process: self.top_bandwidth_process().to_string(),
        }
    }
}

/// Outcome of the top bandwidth consumer query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopBandwidth {
    NotSupported,
}

impl fmt::Display for TopBandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopBandwidth::NotSupported => write!(f, "Not supported"),
        }
    }
}

/// Total link capacity of the monitored adapters.
pub trait LinkCapacity: Send {
    fn capacity_mbps(&mut self) -> Result<f32>;
}

/// Fixed capacity, for links that do not report a speed.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity(pub f32);

impl LinkCapacity for FixedCapacity {
    fn capacity_mbps(&mut self) -> Result<f32> {
        Ok(self.0)
    }
}

/// Rate state shared between a rate thread and readers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateReadings {
    pub upload: f32,
    pub download: f32,
    pub highest_upload: f32,
    pub highest_download: f32,
    pub bandwidth_mbps: f32,
}

impl RateReadings {
    /// Store a new pair of rates in MB/s and raise the session maxima.
    pub fn update(&mut self, upload: f32, download: f32) {
        self.upload = non_negative(upload);
        self.download = non_negative(download);

        if self.upload > self.highest_upload {
            self.highest_upload = self.upload;
        }
        if self.download > self.highest_download {
            self.highest_download = self.download;
        }
    }

    pub fn snapshot(&self) -> NetworkMetrics {
        NetworkMetrics {
            total_bandwidth_mbps: self.bandwidth_mbps,
            upload_mb_per_sec: self.upload,
            download_mb_per_sec: self.download,
            total_used_bandwidth: self.upload + self.download,
            highest_upload_mb_per_sec: self.highest_upload,
            highest_download_mb_per_sec: self.highest_download,
            top_bandwidth_process: TopBandwidth::NotSupported.to_string(),
        }
    }
}

/// Bytes per second to MB/s.
pub fn bytes_to_mb_per_sec(bytes_per_sec: f64) -> f32 {
    non_negative((bytes_per_sec / BYTES_PER_MB) as f32)
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
