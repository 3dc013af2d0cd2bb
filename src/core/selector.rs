//! Startup backend resolution.
//!
//! Picks one concrete implementation per domain from the configured backend
//! and the build target, and starts its background work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::MonitorConfig;
use super::cpu::CpuMonitor;
use super::memory::MemoryMonitor;
use super::metrics::SystemMetrics;
use super::network::NetworkMonitor;
use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Whatever this build targets.
    #[default]
    Auto,
    Linux,
    Windows,
}

impl Backend {
    /// The backend compiled for the current target, if any.
    pub fn native() -> Option<Backend> {
        if cfg!(target_os = "linux") {
            Some(Backend::Linux)
        } else if cfg!(windows) {
            Some(Backend::Windows)
        } else {
            None
        }
    }

    pub fn is_supported(&self) -> bool {
        match self {
            Backend::Auto => Self::native().is_some(),
            Backend::Linux => cfg!(target_os = "linux"),
            Backend::Windows => cfg!(windows),
        }
    }

    /// Turn `Auto` into a concrete backend and reject ones this build lacks.
    pub fn resolve(self) -> Result<Backend> {
        let backend = match self {
            Backend::Auto => Self::native().ok_or_else(|| {
                MonitorError::unsupported_platform(format!(
                    "no backend for {}",
                    std::env::consts::OS
                ))
            })?,
            other => other,
        };

        if !backend.is_supported() {
            return Err(MonitorError::unsupported_platform(format!(
                "{} backend is not available on {}",
                backend,
                std::env::consts::OS
            )));
        }
        Ok(backend)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Auto => "auto",
            Backend::Linux => "linux",
            Backend::Windows => "windows",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Backend {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "linux" => Ok(Backend::Linux),
            "windows" => Ok(Backend::Windows),
            other => Err(MonitorError::config(format!(
                "unknown backend '{}' (expected auto, linux or windows)",
                other
            ))),
        }
    }
}

/// One running monitor per domain.
///
/// Dropping it stops every background thread.
pub struct Monitors {
    pub backend: Backend,
    pub cpu: Box<dyn CpuMonitor>,
    pub memory: Box<dyn MemoryMonitor>,
    pub network: Box<dyn NetworkMonitor>,
}

impl Monitors {
    pub fn snapshot(&self) -> SystemMetrics {
        SystemMetrics {
            timestamp: chrono::Utc::now().timestamp(),
            backend: self.backend.to_string(),
            cpu: self.cpu.snapshot(),
            memory: self.memory.snapshot(),
            network: self.network.snapshot(),
        }
    }
}

/// Resolve the configured backend and start its samplers.
pub fn select_backends(config: &MonitorConfig) -> Result<Monitors> {
    let backend = config.backend.resolve()?;
    log::info!("Using {} backend", backend);

    match backend {
        Backend::Linux => linux_monitors(config),
        Backend::Windows => windows_monitors(config),
        Backend::Auto => Err(MonitorError::unsupported_platform(
            "backend resolution returned auto",
        )),
    }
}

#[cfg(target_os = "linux")]
fn linux_monitors(config: &MonitorConfig) -> Result<Monitors> {
    use super::cpu::CpuSampler;
    use super::memory::MemorySampler;
    use super::network::CaptureEstimator;
    use crate::platform::linux;

    let period = config.poll_interval();

    let cpu = CpuSampler::start(
        Box::new(linux::ProcCpuSource::new()),
        period,
        config.history_capacity,
    )?;
    let memory = MemorySampler::start(
        Box::new(crate::platform::SysinfoMemorySource::new()),
        period,
        config.history_capacity,
        config.process_scan_interval(),
    )?;

    let interface = linux::resolve_interface(config.network_interface.as_deref());
    let capacity = Box::new(linux::SysfsLinkCapacity::new(&interface));
    let capture = linux::open_capture(&interface);
    let network = CaptureEstimator::start(capture, capacity, period)?;

    Ok(Monitors {
        backend: Backend::Linux,
        cpu: Box::new(cpu),
        memory: Box::new(memory),
        network: Box::new(network),
    })
}

#[cfg(not(target_os = "linux"))]
fn linux_monitors(_config: &MonitorConfig) -> Result<Monitors> {
    Err(MonitorError::unsupported_platform(
        "linux backend is not compiled into this build",
    ))
}

#[cfg(windows)]
fn windows_monitors(config: &MonitorConfig) -> Result<Monitors> {
    use super::cpu::CpuSampler;
    use super::memory::MemorySampler;
    use super::network::CounterEstimator;
    use crate::platform::windows;

    let period = config.poll_interval();

    let cpu = CpuSampler::start(
        Box::new(windows::WindowsCpuSource::new()),
        period,
        config.history_capacity,
    )?;
    let memory = MemorySampler::start(
        Box::new(windows::WindowsMemorySource::new()),
        period,
        config.history_capacity,
        config.process_scan_interval(),
    )?;

    let network = CounterEstimator::start(
        Box::new(windows::PdhThroughputCounters::new()),
        Box::new(windows::AdapterLinkCapacity),
        period,
    )?;

    Ok(Monitors {
        backend: Backend::Windows,
        cpu: Box::new(cpu),
        memory: Box::new(memory),
        network: Box::new(network),
    })
}

#[cfg(not(windows))]
fn windows_monitors(_config: &MonitorConfig) -> Result<Monitors> {
    Err(MonitorError::unsupported_platform(
        "windows backend is not compiled into this build",
    ))
}
