//! Throughput from live packet capture.
//!
//! A capture thread classifies every frame by its source MAC and adds the
//! frame length to the sent or received counter. A separate rate thread drains
//! both counters once per tick and turns them into MB/s.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::counters::Throughput;
use super::{bytes_to_mb_per_sec, LinkCapacity, NetworkMonitor, RateReadings};
use crate::core::metrics::NetworkMetrics;
use crate::core::task::PollTask;
use crate::error::Result;

pub type MacAddress = [u8; 6];

const ETHERNET_HEADER_LEN: usize = 14;

/// Capture buffer size; longer frames are truncated but counted in full.
pub const SNAPSHOT_LEN: usize = 65_536;

/// The adapter being captured on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceIdentity {
    pub name: String,
    pub mac: MacAddress,
}

impl fmt::Display for InterfaceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, format_mac(&self.mac))
    }
}

/// Parse `aa:bb:cc:dd:ee:ff` (case-insensitive, `-` also accepted).
pub fn parse_mac(text: &str) -> Option<MacAddress> {
    let mut mac = [0u8; 6];
    let mut parts = text.trim().split([':', '-']);

    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }

    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

pub fn format_mac(mac: &MacAddress) -> String {
    mac.iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(":")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Outbound if the frame's source MAC is ours, inbound otherwise.
///
/// `None` for frames too short to carry an Ethernet header.
pub fn classify_frame(frame: &[u8], own_mac: &MacAddress) -> Option<Direction> {
    if frame.len() < ETHERNET_HEADER_LEN {
        return None;
    }
    if frame[6..12] == own_mac[..] {
        Some(Direction::Outbound)
    } else {
        Some(Direction::Inbound)
    }
}

/// Byte counters written by the capture thread and drained by the rate thread.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    sent: AtomicU64,
    received: AtomicU64,
}

impl TrafficCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, direction: Direction, bytes: u64) {
        let counter = match direction {
            Direction::Outbound => &self.sent,
            Direction::Inbound => &self.received,
        };
        counter.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Classify a captured frame and count `wire_len` bytes for it.
    pub fn observe_frame(
        &self,
        frame: &[u8],
        wire_len: usize,
        own_mac: &MacAddress,
    ) -> Option<Direction> {
        let direction = classify_frame(frame, own_mac)?;
        self.record(direction, wire_len as u64);
        Some(direction)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Read and zero both counters, returning `(sent, received)`.
    pub fn take(&self) -> (u64, u64) {
        (
            self.sent.swap(0, Ordering::AcqRel),
            self.received.swap(0, Ordering::AcqRel),
        )
    }
}

/// Counters plus the instant they were last drained.
#[derive(Debug)]
pub struct RateWindow {
    counters: Arc<TrafficCounters>,
    started: Instant,
}

impl RateWindow {
    pub fn new(counters: Arc<TrafficCounters>, started: Instant) -> Self {
        Self { counters, started }
    }

    /// Bytes per second since the window started, resetting the counters and
    /// the start instant. `None` (and nothing reset) if no time has elapsed.
    pub fn drain(&mut self, now: Instant) -> Option<Throughput> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed.is_zero() {
            return None;
        }

        let (sent, received) = self.counters.take();
        self.started = now;

        let seconds = elapsed.as_secs_f64();
        Some(Throughput {
            sent_bytes_per_sec: sent as f64 / seconds,
            received_bytes_per_sec: received as f64 / seconds,
        })
    }

    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Length information for one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Bytes written into the caller's buffer.
    pub captured_len: usize,
    /// Length of the frame on the wire.
    pub wire_len: usize,
}

/// A live capture handle.
pub trait FrameSource: Send {
    /// Block until a frame arrives or the read timeout expires (`Ok(None)`).
    /// An `Err` ends the capture session.
    fn next_frame(&mut self, buf: &mut [u8]) -> Result<Option<CapturedFrame>>;
}

/// Dedicated thread pulling frames from a `FrameSource`.
pub struct CaptureLoop {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    /// Run `on_frame(captured_bytes, wire_len)` for every frame until the
    /// loop is broken. The source is dropped, closing it, once the loop exits.
    pub fn start<F>(mut source: Box<dyn FrameSource>, mut on_frame: F) -> Result<Self>
    where
        F: FnMut(&[u8], usize) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name("resmon-capture".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; SNAPSHOT_LEN];
                while flag.load(Ordering::Acquire) {
                    match source.next_frame(&mut buf) {
                        Ok(Some(frame)) => {
                            let captured = frame.captured_len.min(buf.len());
                            on_frame(&buf[..captured], frame.wire_len);
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            log::error!("Capture loop exited with error: {}", e);
                            break;
                        }
                    }
                }
                flag.store(false, Ordering::Release);
                drop(source);
                log::debug!("Capture loop stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Ask the loop to exit after the current read returns.
    pub fn break_loop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Break the loop and join the thread.
    pub fn stop(&mut self) {
        self.break_loop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Rate-thread tick logic.
pub struct CaptureRateTracker {
    window: RateWindow,
    capacity: Box<dyn LinkCapacity>,
    readings: Arc<Mutex<RateReadings>>,
}

impl CaptureRateTracker {
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Drain the window as if the clock read `now`. Returns false when the
    /// tick was skipped because no time elapsed.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        let Some(throughput) = self.window.drain(now) else {
            return false;
        };
        let upload = bytes_to_mb_per_sec(throughput.sent_bytes_per_sec);
        let download = bytes_to_mb_per_sec(throughput.received_bytes_per_sec);

        let bandwidth = self.capacity.capacity_mbps();

        let mut readings = self.readings.lock();
        readings.update(upload, download);
        match bandwidth {
            Ok(mbps) => readings.bandwidth_mbps = mbps,
            Err(e) => {
                drop(readings);
                log::debug!("Link capacity unavailable: {}", e);
            }
        }
        true
    }

    pub fn refresh_capacity(&mut self) {
        match self.capacity.capacity_mbps() {
            Ok(mbps) => self.readings.lock().bandwidth_mbps = mbps,
            Err(e) => log::warn!("Link capacity unavailable: {}", e),
        }
    }
}

/// Capture-based estimator (Linux strategy).
pub struct CaptureEstimator {
    interface: Option<InterfaceIdentity>,
    counters: Arc<TrafficCounters>,
    readings: Arc<Mutex<RateReadings>>,
    capture: Option<CaptureLoop>,
    task: Option<PollTask>,
}

impl CaptureEstimator {
    /// Start capturing on `capture` and computing rates every `period`.
    ///
    /// If capture could not be set up the rate thread still runs and the rates
    /// stay at 0.
    pub fn start(
        capture: Result<(InterfaceIdentity, Box<dyn FrameSource>)>,
        capacity: Box<dyn LinkCapacity>,
        period: Duration,
    ) -> Result<Self> {
        let interface = capture.as_ref().ok().map(|(identity, _)| identity.clone());
        let (mut estimator, mut tracker) = Self::manual(interface, capacity, Instant::now());

        match capture {
            Ok((identity, source)) => {
                let counters = estimator.counters.clone();
                let own_mac = identity.mac;
                match CaptureLoop::start(source, move |frame, wire_len| {
                    counters.observe_frame(frame, wire_len, &own_mac);
                }) {
                    Ok(capture) => {
                        log::info!("Capturing on {}", identity);
                        estimator.capture = Some(capture);
                    }
                    Err(e) => log::warn!("Failed to start capture thread: {}", e),
                }
            }
            Err(e) => log::warn!("Packet capture unavailable, rates stay frozen: {}", e),
        }

        estimator.task = Some(PollTask::start("resmon-net-rate", period, move || {
            tracker.tick();
        })?);
        Ok(estimator)
    }

    /// Estimator without capture or rate threads. Feed the returned counters
    /// and drive the tracker directly.
    pub fn manual(
        interface: Option<InterfaceIdentity>,
        capacity: Box<dyn LinkCapacity>,
        started: Instant,
    ) -> (Self, CaptureRateTracker) {
        let counters = Arc::new(TrafficCounters::new());
        let readings = Arc::new(Mutex::new(RateReadings::default()));

        let mut tracker = CaptureRateTracker {
            window: RateWindow::new(counters.clone(), started),
            capacity,
            readings: readings.clone(),
        };
        tracker.refresh_capacity();

        (
            Self {
                interface,
                counters,
                readings,
                capture: None,
                task: None,
            },
            tracker,
        )
    }

    pub fn interface(&self) -> Option<&InterfaceIdentity> {
        self.interface.as_ref()
    }

    pub fn counters(&self) -> Arc<TrafficCounters> {
        self.counters.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture
            .as_ref()
            .map(CaptureLoop::is_running)
            .unwrap_or(false)
    }

    /// Break and join the capture thread, then stop the rate thread.
    pub fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut task) = self.task.take() {
            task.stop();
        }
    }
}

impl NetworkMonitor for CaptureEstimator {
    fn total_bandwidth(&self) -> f32 {
        self.readings.lock().bandwidth_mbps
    }

    fn upload_rate(&self) -> f32 {
        self.readings.lock().upload
    }

    fn download_rate(&self) -> f32 {
        self.readings.lock().download
    }

    fn total_used_bandwidth(&self) -> f32 {
        let readings = self.readings.lock();
        readings.upload + readings.download
    }

    fn highest_upload_rate(&self) -> f32 {
        self.readings.lock().highest_upload
    }

    fn highest_download_rate(&self) -> f32 {
        self.readings.lock().highest_download
    }

    fn snapshot(&self) -> NetworkMetrics {
        let readings = *self.readings.lock();
        readings.snapshot()
    }
}

impl Drop for CaptureEstimator {
    fn drop(&mut self) {
        self.stop();
    }
}
