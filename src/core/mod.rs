// Core sampling and aggregation logic

pub mod config;
pub mod cpu;
pub mod history;
pub mod memory;
pub mod metrics;
pub mod network;
pub mod selector;
pub mod task;

// Re-export commonly used items
pub use config::MonitorConfig;
pub use history::HistoryAggregator;
pub use metrics::{CpuMetrics, MemoryMetrics, NetworkMetrics, SystemMetrics};
pub use task::PollTask;
