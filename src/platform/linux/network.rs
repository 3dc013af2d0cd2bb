use std::ffi::CString;
use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use crate::core::network::capture::{parse_mac, CapturedFrame};
use crate::core::network::{FrameSource, InterfaceIdentity, LinkCapacity, MacAddress};
use crate::error::{MonitorError, Result};

/// Used when no default route can be found.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Reported when the link does not expose a speed (virtual NICs, Wi-Fi).
pub const FALLBACK_LINK_SPEED_MBPS: f32 = 1000.0;

const SYS_CLASS_NET: &str = "/sys/class/net";

/// Interface of the first default route in `/proc/net/route`.
pub fn parse_default_route(content: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let destination = fields.next()?;
        (destination == "00000000").then(|| name.to_string())
    })
}

/// The configured interface, or the default-route one, or `eth0`.
pub fn resolve_interface(configured: Option<&str>) -> String {
    resolve_interface_in(Path::new("/proc"), configured)
}

pub fn resolve_interface_in(proc_root: &Path, configured: Option<&str>) -> String {
    if let Some(name) = configured.map(str::trim).filter(|name| !name.is_empty()) {
        return name.to_string();
    }

    let route_path = proc_root.join("net").join("route");
    match fs::read_to_string(&route_path) {
        Ok(content) => {
            if let Some(name) = parse_default_route(&content) {
                log::debug!("Default route via {}", name);
                return name;
            }
            log::warn!("No default route found, falling back to {}", DEFAULT_INTERFACE);
        }
        Err(e) => log::warn!(
            "Failed to read {}: {}, falling back to {}",
            route_path.display(),
            e,
            DEFAULT_INTERFACE
        ),
    }
    DEFAULT_INTERFACE.to_string()
}

/// Hardware address from `<sys_class_net>/<interface>/address`.
pub fn read_interface_mac(sys_class_net: &Path, interface: &str) -> Result<MacAddress> {
    let path = sys_class_net.join(interface).join("address");
    let content = fs::read_to_string(&path)
        .map_err(|e| MonitorError::source_unavailable(format!("{}: {}", path.display(), e)))?;

    parse_mac(&content).ok_or_else(|| {
        MonitorError::partial_data(format!("malformed MAC address in {}", path.display()))
    })
}

/// Resolve the interface MAC and open a packet socket on it.
pub fn open_capture(interface: &str) -> Result<(InterfaceIdentity, Box<dyn FrameSource>)> {
    let mac = read_interface_mac(Path::new(SYS_CLASS_NET), interface).map_err(|e| {
        MonitorError::capture_failure(format!("no hardware address for {}: {}", interface, e))
    })?;
    let socket = PacketSocket::open(interface)?;

    Ok((
        InterfaceIdentity {
            name: interface.to_string(),
            mac,
        },
        Box::new(socket),
    ))
}

/// Link speed from `/sys/class/net/<interface>/speed`.
pub struct SysfsLinkCapacity {
    speed_path: PathBuf,
}

impl SysfsLinkCapacity {
    pub fn new(interface: &str) -> Self {
        Self::with_root(Path::new(SYS_CLASS_NET), interface)
    }

    pub fn with_root(sys_class_net: &Path, interface: &str) -> Self {
        Self {
            speed_path: sys_class_net.join(interface).join("speed"),
        }
    }
}

impl LinkCapacity for SysfsLinkCapacity {
    fn capacity_mbps(&mut self) -> Result<f32> {
        // reading speed on a down link fails with EINVAL; a lot of drivers report -1
        let speed = fs::read_to_string(&self.speed_path)
            .ok()
            .and_then(|content| content.trim().parse::<i64>().ok())
            .filter(|&mbps| mbps > 0);

        match speed {
            Some(mbps) => Ok(mbps as f32),
            None => {
                log::trace!(
                    "No usable speed at {}, assuming {} Mbps",
                    self.speed_path.display(),
                    FALLBACK_LINK_SPEED_MBPS
                );
                Ok(FALLBACK_LINK_SPEED_MBPS)
            }
        }
    }
}

/// Raw `AF_PACKET` socket receiving every frame on one interface.
///
/// Needs `CAP_NET_RAW`. Reads time out after one second so the capture loop
/// can notice it was asked to stop.
pub struct PacketSocket {
    fd: libc::c_int,
    interface: String,
}

impl PacketSocket {
    pub fn open(interface: &str) -> Result<Self> {
        let name = CString::new(interface).map_err(|_| {
            MonitorError::capture_failure(format!("invalid interface name {:?}", interface))
        })?;

        let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if index == 0 {
            return Err(MonitorError::capture_failure(format!(
                "unknown interface {}: {}",
                interface,
                io::Error::last_os_error()
            )));
        }

        let protocol = (libc::ETH_P_ALL as u16).to_be();
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                protocol as libc::c_int,
            )
        };
        if fd < 0 {
            return Err(MonitorError::capture_failure(format!(
                "failed to open packet socket: {}",
                io::Error::last_os_error()
            )));
        }

        // owns the fd from here on, so early returns close it
        let socket = Self {
            fd,
            interface: interface.to_string(),
        };

        let mut address: libc::sockaddr_ll = unsafe { mem::zeroed() };
        address.sll_family = libc::AF_PACKET as libc::c_ushort;
        address.sll_protocol = protocol;
        address.sll_ifindex = index as libc::c_int;

        let bound = unsafe {
            libc::bind(
                fd,
                &address as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if bound < 0 {
            return Err(MonitorError::capture_failure(format!(
                "failed to bind packet socket to {}: {}",
                interface,
                io::Error::last_os_error()
            )));
        }

        let timeout = libc::timeval {
            tv_sec: 1,
            tv_usec: 0,
        };
        let set = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &timeout as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if set < 0 {
            return Err(MonitorError::capture_failure(format!(
                "failed to set read timeout: {}",
                io::Error::last_os_error()
            )));
        }

        Ok(socket)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameSource for PacketSocket {
    fn next_frame(&mut self, buf: &mut [u8]) -> Result<Option<CapturedFrame>> {
        // MSG_TRUNC makes recv return the full frame length even when truncated
        let received = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                libc::MSG_TRUNC,
            )
        };

        if received < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                    Ok(None)
                }
                _ => Err(MonitorError::capture_failure(format!(
                    "recv on {} failed: {}",
                    self.interface, err
                ))),
            };
        }

        let wire_len = received as usize;
        Ok(Some(CapturedFrame {
            captured_len: wire_len.min(buf.len()),
            wire_len,
        }))
    }
}

impl Drop for PacketSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
