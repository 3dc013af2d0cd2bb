use std::collections::VecDeque;

pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Rolling window of samples plus a session-wide maximum.
///
/// `average()` only sees the last `capacity` samples while `highest()` covers
/// every sample recorded since construction, evicted or not.
#[derive(Debug, Clone)]
pub struct HistoryAggregator {
    capacity: usize,
    samples: VecDeque<f32>,
    highest: f32,
}

impl HistoryAggregator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            highest: 0.0,
        }
    }

    /// Append a sample, evicting the oldest one once the window is full.
    ///
    /// Negative and non-finite values are recorded as 0.
    pub fn record(&mut self, value: f32) {
        let value = if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        };

        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);

        if value > self.highest {
            self.highest = value;
        }
    }

    /// Arithmetic mean of the current window, 0 when empty.
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|&v| v as f64).sum();
        (sum / self.samples.len() as f64) as f32
    }

    pub fn highest(&self) -> f32 {
        self.highest
    }

    /// Most recent sample, 0 when empty.
    pub fn latest(&self) -> f32 {
        self.samples.back().copied().unwrap_or(0.0)
    }

    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}
