use std::time::Duration;

use resmon::core::network::counters::{sum_rates, CounterEstimator};
use resmon::core::network::{FixedCapacity, Throughput};
use resmon::error::MonitorError;
use resmon::NetworkMonitor;

use super::fakes::{eventually, ScriptedCounters};

fn throughput(sent: f64, received: f64) -> resmon::Result<Throughput> {
    Ok(Throughput {
        sent_bytes_per_sec: sent,
        received_bytes_per_sec: received,
    })
}

#[test]
fn test_instances_are_summed() {
    // loopback pseudo-interface, Wi-Fi, and a stale instance reporting garbage
    let received = sum_rates(&[0.0, 2_097_152.0, 1_048_576.0, -1.0]);
    assert_eq!(received, 3_145_728.0);

    let (estimator, mut tracker) = CounterEstimator::manual(
        Box::new(ScriptedCounters::new(vec![throughput(0.0, received)])),
        Box::new(FixedCapacity(866.7)),
    );
    tracker.tick();

    assert_eq!(estimator.download_rate(), 3.0);
    assert_eq!(estimator.upload_rate(), 0.0);
    assert_eq!(estimator.total_bandwidth(), 866.7);
}

#[test]
fn test_rates_freeze_on_error() {
    let (estimator, mut tracker) = CounterEstimator::manual(
        Box::new(ScriptedCounters::new(vec![
            throughput(1_048_576.0, 4_194_304.0),
            Err(MonitorError::source_unavailable("PDH collection failed")),
            throughput(0.0, 1_048_576.0),
        ])),
        Box::new(FixedCapacity(1000.0)),
    );

    tracker.tick();
    tracker.tick();
    assert_eq!(estimator.upload_rate(), 1.0);
    assert_eq!(estimator.download_rate(), 4.0);

    tracker.tick();
    assert_eq!(estimator.download_rate(), 1.0);
    assert_eq!(estimator.highest_download_rate(), 4.0);
    assert_eq!(estimator.total_used_bandwidth(), 1.0);
}

#[test]
fn test_background_thread_reads_counters() {
    let samples = (0..200).map(|_| throughput(524_288.0, 0.0)).collect();
    let estimator = CounterEstimator::start(
        Box::new(ScriptedCounters::new(samples)),
        Box::new(FixedCapacity(1000.0)),
        Duration::from_millis(10),
    )
    .unwrap();

    assert!(eventually(|| estimator.upload_rate() == 0.5));
    drop(estimator);
}
