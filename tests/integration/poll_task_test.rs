use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resmon::core::PollTask;

use super::fakes::eventually;

#[test]
fn test_task_ticks_until_stopped() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();

    let mut task = PollTask::start("test-ticker", Duration::from_millis(5), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    assert_eq!(task.name(), "test-ticker");
    assert!(eventually(|| ticks.load(Ordering::SeqCst) >= 3));

    task.stop();
    assert!(!task.is_running());

    let after_stop = ticks.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
}

#[test]
fn test_drop_stops_long_period_task_promptly() {
    let task = PollTask::start("idle-ticker", Duration::from_secs(3600), || {}).unwrap();
    let started = std::time::Instant::now();
    drop(task);
    assert!(started.elapsed() < Duration::from_secs(2));
}
