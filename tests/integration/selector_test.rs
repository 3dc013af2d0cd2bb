use std::time::{Duration, Instant};

use resmon::core::cpu::CpuSampler;
use resmon::core::memory::MemorySampler;
use resmon::core::network::capture::CaptureEstimator;
use resmon::core::network::{Direction, FixedCapacity};
use resmon::error::MonitorError;
use resmon::{Backend, MonitorConfig, Monitors};

use super::fakes::{ScriptedCpu, SharedMemory};

#[test]
fn test_snapshot_combines_every_domain() {
    let (cpu, mut cpu_tracker) =
        CpuSampler::manual(Box::new(ScriptedCpu::new(&[(100, 200), (150, 300)])), 100);

    let memory_source = SharedMemory::default();
    memory_source.set_status(8_000_000, 4_000_000);
    memory_source.set_processes(&[("redis", 10_240)]);
    let (memory, mut memory_tracker) =
        MemorySampler::manual(Box::new(memory_source), 100, Duration::from_secs(5));

    let start = Instant::now();
    let (network, mut network_tracker) =
        CaptureEstimator::manual(None, Box::new(FixedCapacity(1000.0)), start);
    network.counters().record(Direction::Inbound, 3_145_728);

    cpu_tracker.tick();
    memory_tracker.tick();
    network_tracker.tick_at(start + Duration::from_secs(1));

    let monitors = Monitors {
        backend: Backend::Linux,
        cpu: Box::new(cpu),
        memory: Box::new(memory),
        network: Box::new(network),
    };
    let metrics = monitors.snapshot();

    assert_eq!(metrics.backend, "linux");
    assert_eq!(metrics.cpu.total_usage_percent, 50.0);
    assert_eq!(metrics.memory.total_usage_percent, 50.0);
    assert_eq!(metrics.memory.top_process, "redis (10.00 MB)");
    assert_eq!(metrics.network.download_mb_per_sec, 3.0);
    assert!(metrics.timestamp > 0);

    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["network"]["top_bandwidth_process"], "Not supported");
}

#[test]
fn test_native_backend_is_supported() {
    if let Some(native) = Backend::native() {
        assert!(native.is_supported());
        assert_eq!(Backend::Auto.resolve().unwrap(), native);
    } else {
        assert!(matches!(
            Backend::Auto.resolve(),
            Err(MonitorError::UnsupportedPlatform(_))
        ));
    }
}

#[test]
fn test_foreign_backend_is_unsupported() {
    let foreign = if cfg!(windows) {
        Backend::Linux
    } else {
        Backend::Windows
    };
    let config = MonitorConfig {
        backend: foreign,
        ..Default::default()
    };

    assert!(matches!(
        resmon::select_backends(&config),
        Err(MonitorError::UnsupportedPlatform(_))
    ));
}
