use std::fs;
use std::path::PathBuf;

use crate::core::cpu::{CpuSource, CpuTimes};
use crate::error::{MonitorError, Result};

/// Reads `/proc/stat`, `/proc/cpuinfo` and `/proc/self/task`.
pub struct ProcCpuSource {
    proc_root: PathBuf,
}

impl ProcCpuSource {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn read(&self, relative: &str) -> Result<String> {
        let path = self.proc_root.join(relative);
        fs::read_to_string(&path).map_err(|e| {
            MonitorError::source_unavailable(format!("{}: {}", path.display(), e))
        })
    }
}

impl Default for ProcCpuSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSource for ProcCpuSource {
    fn read_times(&mut self) -> Result<CpuTimes> {
        parse_proc_stat(&self.read("stat")?)
    }

    fn clock_frequency_ghz(&mut self) -> Result<f32> {
        parse_cpu_frequency(&self.read("cpuinfo")?)
    }

    fn used_threads(&mut self) -> Result<u32> {
        let task_dir = self.proc_root.join("self").join("task");
        let entries = fs::read_dir(&task_dir).map_err(|e| {
            MonitorError::source_unavailable(format!("{}: {}", task_dir.display(), e))
        })?;

        let count = entries
            .flatten()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name.parse::<u32>().is_ok())
                    .unwrap_or(false)
            })
            .count();
        Ok(count as u32)
    }

    fn total_threads(&mut self) -> Result<u32> {
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if online <= 0 {
            return Err(MonitorError::source_unavailable(
                "sysconf(_SC_NPROCESSORS_ONLN) failed",
            ));
        }
        Ok(online as u32)
    }
}

/// Aggregate idle and total jiffies from the first line of `/proc/stat`.
///
/// Idle includes iowait; total is the sum of every field.
pub fn parse_proc_stat(content: &str) -> Result<CpuTimes> {
    let line = content
        .lines()
        .next()
        .filter(|line| line.starts_with("cpu "))
        .ok_or_else(|| MonitorError::partial_data("/proc/stat has no aggregate cpu line"))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| MonitorError::partial_data(format!("bad /proc/stat field: {}", e)))?;

    if fields.len() < 5 {
        return Err(MonitorError::partial_data(format!(
            "/proc/stat cpu line has {} fields, need at least 5",
            fields.len()
        )));
    }

    Ok(CpuTimes {
        idle: fields[3] + fields[4],
        total: fields.iter().sum(),
    })
}

/// First `cpu MHz` entry of `/proc/cpuinfo`, in GHz.
pub fn parse_cpu_frequency(content: &str) -> Result<f32> {
    let mhz = content
        .lines()
        .filter(|line| line.starts_with("cpu MHz"))
        .find_map(|line| line.split(':').nth(1)?.trim().parse::<f32>().ok())
        .ok_or_else(|| MonitorError::partial_data("no cpu MHz entry in /proc/cpuinfo"))?;

    Ok(mhz / 1000.0)
}
