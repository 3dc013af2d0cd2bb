//! Windows sources.
//!
//! Win32 calls go through `windows-sys`; processor clock through WMI and the
//! process list through `sysinfo`.

mod cpu;
mod memory;
mod network;

pub use cpu::WindowsCpuSource;
pub use memory::WindowsMemorySource;
pub use network::{AdapterLinkCapacity, PdhThroughputCounters};
