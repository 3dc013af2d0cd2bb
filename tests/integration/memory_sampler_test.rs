use std::time::{Duration, Instant};

use resmon::core::memory::{MemorySampler, NO_PROCESS};
use resmon::MemoryMonitor;

use super::fakes::{eventually, SharedMemory};

fn sampler_with(source: &SharedMemory) -> (MemorySampler, resmon::core::memory::MemoryTracker) {
    MemorySampler::manual(Box::new(source.clone()), 100, Duration::from_secs(5))
}

#[test]
fn test_half_of_eight_gigabytes() {
    let source = SharedMemory::default();
    source.set_status(8_000_000, 4_000_000);
    let (sampler, mut tracker) = sampler_with(&source);

    tracker.tick();
    assert_eq!(sampler.total_usage(), 50.0);
    assert!((sampler.remaining_ram() - 3906.25).abs() < 0.001);
    assert_eq!(sampler.average_usage(), 50.0);

    let snapshot = sampler.snapshot();
    assert!((snapshot.used_ram_mb - 3906.25).abs() < 0.01);
}

#[test]
fn test_unreadable_status_degrades_to_zero() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    let (sampler, mut tracker) = sampler_with(&source);
    tracker.tick();

    *source.status.lock() = None;
    tracker.tick();

    assert_eq!(sampler.total_usage(), 0.0);
    assert_eq!(sampler.remaining_ram(), 0.0);
    assert_eq!(sampler.history_len(), 1);
    assert_eq!(sampler.average_usage(), 50.0);
}

#[test]
fn test_top_process_scan_is_throttled() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    source.set_processes(&[("bash", 2_048), ("firefox", 512_000)]);
    let (sampler, mut tracker) = sampler_with(&source);
    let start = Instant::now();

    assert_eq!(sampler.top_consuming_process(), NO_PROCESS);

    tracker.tick_at(start);
    assert_eq!(sampler.top_consuming_process(), "firefox (500.00 MB)");
    assert_eq!(source.scan_count(), 1);

    source.set_processes(&[("java", 1_024_000)]);
    tracker.tick_at(start + Duration::from_secs(2));
    assert_eq!(sampler.top_consuming_process(), "firefox (500.00 MB)");
    assert_eq!(source.scan_count(), 1);

    tracker.tick_at(start + Duration::from_secs(5));
    assert_eq!(sampler.top_consuming_process(), "java (1000.00 MB)");
    assert_eq!(source.scan_count(), 2);
}

#[test]
fn test_tie_resolves_to_last_scanned() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    source.set_processes(&[("first", 4_096), ("second", 4_096), ("small", 10)]);
    let (sampler, mut tracker) = sampler_with(&source);

    tracker.tick();
    assert_eq!(sampler.top_consuming_process(), "second (4.00 MB)");
}

#[test]
fn test_empty_scan_reports_sentinel() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    let (sampler, mut tracker) = sampler_with(&source);

    tracker.tick();
    assert_eq!(sampler.top_consuming_process(), NO_PROCESS);
}

#[test]
fn test_start_samples_immediately() {
    let source = SharedMemory::default();
    source.set_status(2_000, 500);
    source.set_processes(&[("init", 1_024)]);

    let sampler = MemorySampler::start(
        Box::new(source.clone()),
        Duration::from_secs(60),
        100,
        Duration::from_secs(5),
    )
    .unwrap();

    assert_eq!(sampler.total_usage(), 75.0);
    assert_eq!(sampler.top_consuming_process(), "init (1.00 MB)");
    assert!(eventually(|| source.scan_count() == 1));
    drop(sampler);
}

#[test]
fn test_failing_scan_is_still_throttled() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    source.set_processes(&[("bash", 2_048)]);
    source.set_scan_failure(true);
    let (sampler, mut tracker) = sampler_with(&source);
    let start = Instant::now();

    for second in 0..5 {
        tracker.tick_at(start + Duration::from_secs(second));
    }
    assert_eq!(source.scan_count(), 1);
    assert_eq!(sampler.top_consuming_process(), NO_PROCESS);

    source.set_scan_failure(false);
    tracker.tick_at(start + Duration::from_secs(5));
    assert_eq!(source.scan_count(), 2);
    assert_eq!(sampler.top_consuming_process(), "bash (2.00 MB)");
}

#[test]
fn test_failed_scan_keeps_previous_top_process() {
    let source = SharedMemory::default();
    source.set_status(1_000, 500);
    source.set_processes(&[("redis", 8_192)]);
    let (sampler, mut tracker) = sampler_with(&source);
    let start = Instant::now();

    tracker.tick_at(start);
    source.set_scan_failure(true);
    tracker.tick_at(start + Duration::from_secs(5));

    assert_eq!(source.scan_count(), 2);
    assert_eq!(sampler.top_consuming_process(), "redis (8.00 MB)");
}

#[test]
fn test_available_above_total_clamps_to_zero() {
    let source = SharedMemory::default();
    source.set_status(1_000, 4_000);
    let (sampler, mut tracker) = sampler_with(&source);

    tracker.tick();
    assert_eq!(sampler.total_usage(), 0.0);
    assert_eq!(sampler.average_usage(), 0.0);
    assert!((0.0..=100.0).contains(&sampler.snapshot().total_usage_percent));
}

#[test]
fn test_queries_are_idempotent_between_ticks() {
    let source = SharedMemory::default();
    source.set_status(8_000_000, 2_000_000);
    source.set_processes(&[("java", 1_024_000)]);
    let (sampler, mut tracker) = sampler_with(&source);
    tracker.tick();

    let first = sampler.snapshot();
    let second = sampler.snapshot();
    assert_eq!(first, second);
    assert_eq!(sampler.top_consuming_process(), sampler.top_consuming_process());
    assert_eq!(source.scan_count(), 1);
}

#[test]
fn test_background_thread_samples_and_stops() {
    let source = SharedMemory::default();
    source.set_status(1_000, 250);

    let mut sampler = MemorySampler::start(
        Box::new(source.clone()),
        Duration::from_millis(10),
        100,
        Duration::from_secs(5),
    )
    .unwrap();

    assert!(eventually(|| sampler.history_len() >= 3));
    assert_eq!(sampler.total_usage(), 75.0);

    sampler.stop();
    let len = sampler.history_len();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(sampler.history_len(), len);

    // stopping twice is a no-op, and so is the drop that follows
    sampler.stop();
    drop(sampler);
}
