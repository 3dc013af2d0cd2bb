//! Linux sources.
//!
//! CPU times come from procfs, link details from sysfs, and frames from an
//! `AF_PACKET` socket. Memory goes through the shared `sysinfo` source. Every
//! path-based source takes an injectable root so it can be pointed at fixture
//! trees.

mod cpu;
mod network;

pub use cpu::{parse_cpu_frequency, parse_proc_stat, ProcCpuSource};
pub use network::{
    open_capture, parse_default_route, read_interface_mac, resolve_interface,
    resolve_interface_in, PacketSocket, SysfsLinkCapacity, DEFAULT_INTERFACE,
    FALLBACK_LINK_SPEED_MBPS,
};
