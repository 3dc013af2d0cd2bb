use resmon::core::HistoryAggregator;

#[test]
fn test_keeps_last_hundred_in_order() {
    let mut history = HistoryAggregator::new();
    for i in 0..150 {
        history.record(i as f32 * 0.5);
    }

    let samples: Vec<f32> = history.samples().collect();
    let expected: Vec<f32> = (50..150).map(|i| i as f32 * 0.5).collect();
    assert_eq!(history.len(), 100);
    assert_eq!(samples, expected);
}

#[test]
fn test_highest_is_never_below_any_sample() {
    let mut history = HistoryAggregator::with_capacity(10);
    let values = [12.0, 88.5, 3.0, 41.0, 88.4, 0.0, 99.9, 1.0];
    let mut previous_highest = 0.0;

    for value in values {
        history.record(value);
        assert!(history.highest() >= previous_highest);
        assert!(history.highest() >= value);
        previous_highest = history.highest();
    }
    assert_eq!(history.highest(), 99.9);
}

#[test]
fn test_average_of_current_window() {
    let mut history = HistoryAggregator::with_capacity(4);
    for value in [100.0, 10.0, 20.0, 30.0, 40.0] {
        history.record(value);
    }

    // 100.0 was evicted; the all-time maximum still remembers it
    assert_eq!(history.average(), 25.0);
    assert_eq!(history.highest(), 100.0);
    assert_eq!(history.latest(), 40.0);
}

#[test]
fn test_empty_history() {
    let history = HistoryAggregator::default();
    assert!(history.is_empty());
    assert_eq!(history.average(), 0.0);
    assert_eq!(history.highest(), 0.0);
}
