use serde::{Deserialize, Serialize};

/// Point-in-time readout of every sampler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub timestamp: i64, // Unix timestamp
    pub backend: String,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub network: NetworkMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuMetrics {
    pub total_usage_percent: f32,
    pub clock_frequency_ghz: f32,
    pub used_threads: u32,
    pub total_threads: u32,
    pub highest_usage_percent: f32,
    pub average_usage_percent: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetrics {
    pub total_usage_percent: f32,
    pub remaining_ram_mb: f32,
    pub used_ram_mb: f32,
    pub average_usage_percent: f32,
    pub top_process: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkMetrics {
    pub total_bandwidth_mbps: f32,
    pub upload_mb_per_sec: f32,
    pub download_mb_per_sec: f32,
    /// Sum of the two current rates, not a byte total.
    pub total_used_bandwidth: f32,
    pub highest_upload_mb_per_sec: f32,
    pub highest_download_mb_per_sec: f32,
    pub top_bandwidth_process: String,
}

/// Back out used RAM from the remaining amount and the usage percentage.
///
/// Returns 0 when the inputs cannot describe a total (usage at or above 100%,
/// nothing remaining).
pub fn estimate_used_ram(remaining_mb: f32, usage_percent: f32) -> f32 {
    if remaining_mb <= 0.0 || usage_percent >= 100.0 {
        return 0.0;
    }
    let total_mb = remaining_mb / ((100.0 - usage_percent) / 100.0);
    (total_mb - remaining_mb).max(0.0)
}
