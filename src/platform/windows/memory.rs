use std::mem;

use windows_sys::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};

use crate::core::memory::{MemorySource, MemoryStatus, ProcessMemory};
use crate::error::{MonitorError, Result};
use crate::platform::memory::SysinfoMemorySource;

/// `GlobalMemoryStatusEx` for totals, `sysinfo` for the process list.
#[derive(Default)]
pub struct WindowsMemorySource {
    processes: SysinfoMemorySource,
}

impl WindowsMemorySource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemorySource for WindowsMemorySource {
    fn read_status(&mut self) -> Result<MemoryStatus> {
        let mut status: MEMORYSTATUSEX = unsafe { mem::zeroed() };
        status.dwLength = mem::size_of::<MEMORYSTATUSEX>() as u32;

        if unsafe { GlobalMemoryStatusEx(&mut status) } == 0 {
            return Err(MonitorError::source_unavailable(format!(
                "GlobalMemoryStatusEx failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        Ok(MemoryStatus {
            total_kb: status.ullTotalPhys / 1024,
            available_kb: status.ullAvailPhys / 1024,
        })
    }

    fn scan_processes(&mut self) -> Result<Vec<ProcessMemory>> {
        self.processes.scan_processes()
    }
}
