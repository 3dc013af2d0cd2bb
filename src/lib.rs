// resmon library - public API

// Re-export error types
pub mod error;
pub use error::{MonitorError, Result};

// Module declarations
pub mod core;
pub mod platform;
pub mod ui;

// Re-export commonly used types
pub use crate::core::config::MonitorConfig;
pub use crate::core::cpu::CpuMonitor;
pub use crate::core::memory::MemoryMonitor;
pub use crate::core::network::NetworkMonitor;
pub use crate::core::selector::{select_backends, Backend, Monitors};

// Initialize logging
//
// `RUST_LOG` wins over the default `info` filter. A second call keeps the
// logger already installed.
pub fn init_logging() {
    if let Err(e) =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init()
    {
        log::debug!("Logger already initialized: {}", e);
    }
}
