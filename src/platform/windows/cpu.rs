use std::mem;

use serde::Deserialize;
use windows_sys::Win32::Foundation::{CloseHandle, FILETIME, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcessId, GetSystemTimes};
use wmi::WMIConnection;

use crate::core::cpu::{CpuSource, CpuTimes};
use crate::error::{MonitorError, Result};

#[derive(Deserialize, Debug)]
#[serde(rename = "Win32_Processor")]
#[serde(rename_all = "PascalCase")]
struct Win32Processor {
    current_clock_speed: Option<u32>, // MHz
}

/// Thread counts from one Toolhelp32 snapshot.
#[derive(Debug, Clone, Copy, Default)]
struct ThreadCounts {
    own: u32,
    total: u32,
}

/// `GetSystemTimes`, WMI processor clock and Toolhelp32 thread enumeration.
pub struct WindowsCpuSource {
    // used and total come from the same snapshot; keep the second half for
    // the total_threads call that follows used_threads in a tick
    pending_total: Option<u32>,
}

impl WindowsCpuSource {
    pub fn new() -> Self {
        Self {
            pending_total: None,
        }
    }
}

impl Default for WindowsCpuSource {
    fn default() -> Self {
        Self::new()
    }
}

fn filetime_to_u64(time: &FILETIME) -> u64 {
    ((time.dwHighDateTime as u64) << 32) | time.dwLowDateTime as u64
}

fn count_threads() -> Result<ThreadCounts> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(MonitorError::source_unavailable(format!(
            "CreateToolhelp32Snapshot failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    let pid = unsafe { GetCurrentProcessId() };
    let mut counts = ThreadCounts::default();

    let mut entry: THREADENTRY32 = unsafe { mem::zeroed() };
    entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

    unsafe {
        if Thread32First(snapshot, &mut entry) != 0 {
            loop {
                counts.total += 1;
                if entry.th32OwnerProcessID == pid {
                    counts.own += 1;
                }
                if Thread32Next(snapshot, &mut entry) == 0 {
                    break;
                }
            }
        }
        CloseHandle(snapshot);
    }

    if counts.total == 0 {
        return Err(MonitorError::partial_data("thread snapshot was empty"));
    }
    Ok(counts)
}

impl CpuSource for WindowsCpuSource {
    fn read_times(&mut self) -> Result<CpuTimes> {
        let mut idle: FILETIME = unsafe { mem::zeroed() };
        let mut kernel: FILETIME = unsafe { mem::zeroed() };
        let mut user: FILETIME = unsafe { mem::zeroed() };

        let ok = unsafe { GetSystemTimes(&mut idle, &mut kernel, &mut user) };
        if ok == 0 {
            return Err(MonitorError::source_unavailable(format!(
                "GetSystemTimes failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // kernel time already includes idle time
        Ok(CpuTimes {
            idle: filetime_to_u64(&idle),
            total: filetime_to_u64(&kernel) + filetime_to_u64(&user),
        })
    }

    fn clock_frequency_ghz(&mut self) -> Result<f32> {
        // WMIConnection is not Send, so it cannot live on the source
        let wmi_con = WMIConnection::new().map_err(|e| {
            MonitorError::source_unavailable(format!("Failed to connect to WMI: {}", e))
        })?;

        let processors: Vec<Win32Processor> = wmi_con.query().map_err(|e| {
            MonitorError::source_unavailable(format!("WMI query failed: {}", e))
        })?;

        processors
            .first()
            .and_then(|p| p.current_clock_speed)
            .map(|mhz| mhz as f32 / 1000.0)
            .ok_or_else(|| MonitorError::partial_data("Win32_Processor has no CurrentClockSpeed"))
    }

    fn used_threads(&mut self) -> Result<u32> {
        let counts = count_threads()?;
        self.pending_total = Some(counts.total);
        Ok(counts.own)
    }

    fn total_threads(&mut self) -> Result<u32> {
        match self.pending_total.take() {
            Some(total) => Ok(total),
            None => Ok(count_threads()?.total),
        }
    }
}
