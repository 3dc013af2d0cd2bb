//! Memory source shared by every backend.
//!
//! Totals and the process list both come from one `sysinfo::System`.

use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::core::memory::{MemorySource, MemoryStatus, ProcessMemory};
use crate::error::Result;

/// One process as enumerated, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub resident_bytes: u64,
}

/// Named processes with resident memory, in ascending pid order.
pub fn resident_processes(mut entries: Vec<ProcessEntry>) -> Vec<ProcessMemory> {
    entries.sort_unstable_by_key(|entry| entry.pid);
    entries
        .into_iter()
        .filter_map(|entry| {
            let rss_kb = entry.resident_bytes / 1024;
            if entry.name.is_empty() || rss_kb == 0 {
                return None;
            }
            Some(ProcessMemory {
                name: entry.name,
                rss_kb,
            })
        })
        .collect()
}

pub struct SysinfoMemorySource {
    system: System,
}

impl SysinfoMemorySource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Refresh the process table and list every process, threads excluded.
    pub fn process_entries(&mut self) -> Vec<ProcessEntry> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        self.system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().to_string(),
                resident_bytes: process.memory(),
            })
            .collect()
    }
}

impl Default for SysinfoMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SysinfoMemorySource {
    fn read_status(&mut self) -> Result<MemoryStatus> {
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        Ok(MemoryStatus {
            total_kb: self.system.total_memory() / 1024,
            available_kb: self.system.available_memory() / 1024,
        })
    }

    fn scan_processes(&mut self) -> Result<Vec<ProcessMemory>> {
        let processes = resident_processes(self.process_entries());
        log::trace!("sysinfo listed {} resident processes", processes.len());
        Ok(processes)
    }
}
