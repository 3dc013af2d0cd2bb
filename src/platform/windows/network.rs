use std::mem;
use std::ptr;

use windows_sys::Win32::Foundation::{ERROR_BUFFER_OVERFLOW, ERROR_SUCCESS};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetAdaptersAddresses, GAA_FLAG_SKIP_ANYCAST, GAA_FLAG_SKIP_DNS_SERVER,
    GAA_FLAG_SKIP_MULTICAST, IP_ADAPTER_ADDRESSES_LH,
};
use windows_sys::Win32::Networking::WinSock::AF_UNSPEC;
use windows_sys::Win32::System::Performance::{
    PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterArrayW,
    PdhOpenQueryW, PDH_CSTATUS_VALID_DATA, PDH_FMT_COUNTERVALUE_ITEM_W, PDH_FMT_DOUBLE,
    PDH_HCOUNTER, PDH_HQUERY, PDH_MORE_DATA,
};

use crate::core::network::counters::sum_rates;
use crate::core::network::{LinkCapacity, Throughput, ThroughputCounters};
use crate::error::{MonitorError, Result};

const BYTES_SENT_COUNTER: &str = "\\Network Interface(*)\\Bytes Sent/sec";
const BYTES_RECEIVED_COUNTER: &str = "\\Network Interface(*)\\Bytes Received/sec";

const IF_TYPE_SOFTWARE_LOOPBACK: u32 = 24;
const IF_OPER_STATUS_UP: i32 = 1;

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Open PDH query over the wildcard Network Interface counters.
struct PdhQuery {
    query: PDH_HQUERY,
    sent: PDH_HCOUNTER,
    received: PDH_HCOUNTER,
}

// PDH handles may be used from any thread as long as only one uses them at a time
unsafe impl Send for PdhQuery {}

impl PdhQuery {
    fn open() -> Result<Self> {
        let mut query: PDH_HQUERY = unsafe { mem::zeroed() };
        let status = unsafe { PdhOpenQueryW(ptr::null(), 0, &mut query) };
        if status as u32 != ERROR_SUCCESS {
            return Err(MonitorError::source_unavailable(format!(
                "PdhOpenQueryW failed: 0x{:08x}",
                status as u32
            )));
        }

        let mut counters = Self {
            query,
            sent: unsafe { mem::zeroed() },
            received: unsafe { mem::zeroed() },
        };
        counters.sent = counters.add_counter(BYTES_SENT_COUNTER)?;
        counters.received = counters.add_counter(BYTES_RECEIVED_COUNTER)?;

        // rate counters need two collections; the first one primes them
        unsafe { PdhCollectQueryData(counters.query) };
        Ok(counters)
    }

    fn add_counter(&self, path: &str) -> Result<PDH_HCOUNTER> {
        let path_w = wide(path);
        let mut counter: PDH_HCOUNTER = unsafe { mem::zeroed() };
        let status =
            unsafe { PdhAddEnglishCounterW(self.query, path_w.as_ptr(), 0, &mut counter) };
        if status as u32 != ERROR_SUCCESS {
            return Err(MonitorError::source_unavailable(format!(
                "PdhAddEnglishCounterW({}) failed: 0x{:08x}",
                path, status as u32
            )));
        }
        Ok(counter)
    }

    /// Every instance value of one counter, skipping invalid ones.
    fn instance_values(&self, counter: PDH_HCOUNTER) -> Result<Vec<f64>> {
        let mut buffer_size: u32 = 0;
        let mut item_count: u32 = 0;

        let status = unsafe {
            PdhGetFormattedCounterArrayW(
                counter,
                PDH_FMT_DOUBLE,
                &mut buffer_size,
                &mut item_count,
                ptr::null_mut(),
            )
        };
        if status as u32 != PDH_MORE_DATA as u32 {
            return Err(MonitorError::partial_data(format!(
                "PDH counter array size query failed: 0x{:08x}",
                status as u32
            )));
        }

        let item_size = mem::size_of::<PDH_FMT_COUNTERVALUE_ITEM_W>();
        let capacity = (buffer_size as usize).div_ceil(item_size);
        let mut items: Vec<PDH_FMT_COUNTERVALUE_ITEM_W> = Vec::with_capacity(capacity);

        let status = unsafe {
            PdhGetFormattedCounterArrayW(
                counter,
                PDH_FMT_DOUBLE,
                &mut buffer_size,
                &mut item_count,
                items.as_mut_ptr(),
            )
        };
        if status as u32 != ERROR_SUCCESS {
            return Err(MonitorError::partial_data(format!(
                "PdhGetFormattedCounterArrayW failed: 0x{:08x}",
                status as u32
            )));
        }

        let count = (item_count as usize).min(capacity);
        unsafe { items.set_len(count) };

        Ok(items
            .iter()
            .filter(|item| item.FmtValue.CStatus as u32 == PDH_CSTATUS_VALID_DATA as u32)
            .map(|item| unsafe { item.FmtValue.Anonymous.doubleValue })
            .collect())
    }
}

impl PdhQuery {
    fn sample(&mut self) -> Result<Throughput> {
        let status = unsafe { PdhCollectQueryData(self.query) };
        if status as u32 != ERROR_SUCCESS {
            return Err(MonitorError::source_unavailable(format!(
                "PdhCollectQueryData failed: 0x{:08x}",
                status as u32
            )));
        }

        Ok(Throughput {
            sent_bytes_per_sec: sum_rates(&self.instance_values(self.sent)?),
            received_bytes_per_sec: sum_rates(&self.instance_values(self.received)?),
        })
    }
}

impl Drop for PdhQuery {
    fn drop(&mut self) {
        unsafe {
            PdhCloseQuery(self.query);
        }
    }
}

/// Aggregated throughput from PDH. The query is opened on first use and
/// reopened after a failed collection.
#[derive(Default)]
pub struct PdhThroughputCounters {
    query: Option<PdhQuery>,
}

impl PdhThroughputCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThroughputCounters for PdhThroughputCounters {
    fn sample(&mut self) -> Result<Throughput> {
        if self.query.is_none() {
            self.query = Some(PdhQuery::open()?);
        }

        let result = match self.query.as_mut() {
            Some(query) => query.sample(),
            None => return Err(MonitorError::source_unavailable("PDH query is not open")),
        };
        if result.is_err() {
            self.query = None;
        }
        result
    }
}

/// Link speeds of active adapters summed, in Mbps.
pub struct AdapterLinkCapacity;

/// One adapter as reported by `GetAdaptersAddresses`.
#[derive(Debug, Clone, Copy)]
struct AdapterLink {
    if_type: u32,
    oper_status: i32,
    transmit_bits_per_sec: u64,
}

fn active_capacity_mbps(adapters: &[AdapterLink]) -> f32 {
    adapters
        .iter()
        .filter(|a| a.if_type != IF_TYPE_SOFTWARE_LOOPBACK && a.oper_status == IF_OPER_STATUS_UP)
        .filter(|a| a.transmit_bits_per_sec != u64::MAX)
        .map(|a| a.transmit_bits_per_sec as f64 / 1_000_000.0)
        .sum::<f64>() as f32
}

fn list_adapters() -> Result<Vec<AdapterLink>> {
    let flags = GAA_FLAG_SKIP_ANYCAST | GAA_FLAG_SKIP_MULTICAST | GAA_FLAG_SKIP_DNS_SERVER;
    let mut size: u32 = 15 * 1024;

    for _ in 0..3 {
        // u64 storage keeps the adapter structs aligned
        let mut buffer: Vec<u64> = vec![0; (size as usize).div_ceil(8)];
        let head = buffer.as_mut_ptr() as *mut IP_ADAPTER_ADDRESSES_LH;

        let status = unsafe {
            GetAdaptersAddresses(AF_UNSPEC as u32, flags, ptr::null(), head, &mut size)
        };

        if status == ERROR_BUFFER_OVERFLOW {
            continue;
        }
        if status != ERROR_SUCCESS {
            return Err(MonitorError::source_unavailable(format!(
                "GetAdaptersAddresses failed: {}",
                status
            )));
        }

        let mut adapters = Vec::new();
        let mut current = head as *const IP_ADAPTER_ADDRESSES_LH;
        while !current.is_null() {
            let adapter = unsafe { &*current };
            adapters.push(AdapterLink {
                if_type: adapter.IfType,
                oper_status: adapter.OperStatus as i32,
                transmit_bits_per_sec: adapter.TransmitLinkSpeed,
            });
            current = adapter.Next as *const IP_ADAPTER_ADDRESSES_LH;
        }
        return Ok(adapters);
    }

    Err(MonitorError::source_unavailable(
        "GetAdaptersAddresses kept asking for a larger buffer",
    ))
}

impl LinkCapacity for AdapterLinkCapacity {
    fn capacity_mbps(&mut self) -> Result<f32> {
        Ok(active_capacity_mbps(&list_adapters()?))
    }
}
