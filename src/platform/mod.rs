// Platform-specific sources

pub mod memory;
pub use memory::SysinfoMemorySource;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(windows)]
pub mod windows;
