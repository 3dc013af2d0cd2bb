use std::sync::mpsc;
use std::time::{Duration, Instant};

use resmon::core::network::capture::CaptureEstimator;
use resmon::core::network::{Direction, FixedCapacity, FrameSource, InterfaceIdentity};
use resmon::error::MonitorError;
use resmon::NetworkMonitor;

use super::fakes::{ethernet_frame, eventually, ChannelFrames};

const OWN_MAC: [u8; 6] = [0x02, 0x00, 0x5e, 0x10, 0x20, 0x30];
const ROUTER_MAC: [u8; 6] = [0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e];

fn identity() -> InterfaceIdentity {
    InterfaceIdentity {
        name: "eth0".to_string(),
        mac: OWN_MAC,
    }
}

#[test]
fn test_three_megabytes_in_one_second() {
    let start = Instant::now();
    let (estimator, mut tracker) =
        CaptureEstimator::manual(Some(identity()), Box::new(FixedCapacity(1000.0)), start);
    let counters = estimator.counters();

    counters.record(Direction::Inbound, 3_145_728);
    assert!(tracker.tick_at(start + Duration::from_secs(1)));

    assert!((estimator.download_rate() - 3.0).abs() < 1e-6);
    assert_eq!(estimator.upload_rate(), 0.0);
    assert_eq!(counters.sent(), 0);
    assert_eq!(counters.received(), 0);
    assert_eq!(estimator.total_bandwidth(), 1000.0);
}

#[test]
fn test_highest_rates_survive_quiet_ticks() {
    let start = Instant::now();
    let (estimator, mut tracker) =
        CaptureEstimator::manual(None, Box::new(FixedCapacity(100.0)), start);
    let counters = estimator.counters();

    counters.record(Direction::Outbound, 2_097_152);
    tracker.tick_at(start + Duration::from_secs(1));
    tracker.tick_at(start + Duration::from_secs(2));

    assert_eq!(estimator.upload_rate(), 0.0);
    assert_eq!(estimator.highest_upload_rate(), 2.0);
    assert_eq!(estimator.highest_download_rate(), 0.0);
}

#[test]
fn test_zero_elapsed_tick_is_skipped() {
    let start = Instant::now();
    let (estimator, mut tracker) =
        CaptureEstimator::manual(None, Box::new(FixedCapacity(100.0)), start);
    let counters = estimator.counters();

    counters.record(Direction::Inbound, 1_024);
    assert!(!tracker.tick_at(start));
    assert_eq!(counters.received(), 1_024);
}

#[test]
fn test_used_bandwidth_is_rate_sum_and_top_process_unsupported() {
    let start = Instant::now();
    let (estimator, mut tracker) =
        CaptureEstimator::manual(None, Box::new(FixedCapacity(100.0)), start);
    let counters = estimator.counters();

    counters.record(Direction::Outbound, 1_048_576);
    counters.record(Direction::Inbound, 524_288);
    tracker.tick_at(start + Duration::from_secs(1));

    assert_eq!(estimator.total_used_bandwidth(), 1.5);
    assert_eq!(estimator.top_bandwidth_process().to_string(), "Not supported");
    assert_eq!(estimator.snapshot().top_bandwidth_process, "Not supported");
}

#[test]
fn test_capture_thread_classifies_frames() {
    let (tx, rx) = mpsc::channel();
    let source: Box<dyn FrameSource> = Box::new(ChannelFrames(rx));

    // long period so the rate thread does not drain the counters mid-test
    let mut estimator = CaptureEstimator::start(
        Ok((identity(), source)),
        Box::new(FixedCapacity(1000.0)),
        Duration::from_secs(60),
    )
    .unwrap();
    let counters = estimator.counters();

    tx.send(ethernet_frame(OWN_MAC, ROUTER_MAC, 1_500)).unwrap();
    tx.send(ethernet_frame(ROUTER_MAC, OWN_MAC, 600)).unwrap();
    tx.send(ethernet_frame(ROUTER_MAC, [0xff; 6], 60)).unwrap();
    tx.send(vec![0u8; 8]).unwrap();

    assert!(eventually(|| counters.sent() == 1_500 && counters.received() == 660));
    assert!(estimator.is_capturing());
    assert_eq!(estimator.interface(), Some(&identity()));

    estimator.stop();
    assert!(!estimator.is_capturing());
}

#[test]
fn test_capture_failure_keeps_rates_at_zero() {
    let mut estimator = CaptureEstimator::start(
        Err(MonitorError::capture_failure("permission denied")),
        Box::new(FixedCapacity(1000.0)),
        Duration::from_millis(10),
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    assert!(!estimator.is_capturing());
    assert!(estimator.interface().is_none());
    assert_eq!(estimator.upload_rate(), 0.0);
    assert_eq!(estimator.download_rate(), 0.0);
    assert_eq!(estimator.total_bandwidth(), 1000.0);
    estimator.stop();
}

#[test]
fn test_source_error_ends_capture() {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let source: Box<dyn FrameSource> = Box::new(ChannelFrames(rx));
    let estimator = CaptureEstimator::start(
        Ok((identity(), source)),
        Box::new(FixedCapacity(1000.0)),
        Duration::from_secs(60),
    )
    .unwrap();

    drop(tx);
    assert!(eventually(|| !estimator.is_capturing()));
}

#[test]
fn test_queries_are_idempotent_between_ticks() {
    let start = Instant::now();
    let (estimator, mut tracker) =
        CaptureEstimator::manual(Some(identity()), Box::new(FixedCapacity(1000.0)), start);
    let counters = estimator.counters();

    counters.record(Direction::Outbound, 1_048_576);
    tracker.tick_at(start + Duration::from_secs(1));

    let first = estimator.snapshot();
    let second = estimator.snapshot();
    assert_eq!(first, second);
    assert_eq!(estimator.upload_rate(), 1.0);
    assert_eq!(estimator.upload_rate(), estimator.upload_rate());
}
