use std::collections::VecDeque;
use std::time::Duration;

/// Rolling window of forward pass latencies
#[derive(Debug, Clone)]
pub struct PassTimings {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl PassTimings {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one pass, evicting the oldest once the window is full
    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean latency in milliseconds
    pub fn average_ms(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        Some(total / self.samples.len() as f64)
    }

    /// Passes per second implied by the mean latency
    pub fn fps(&self) -> Option<f64> {
        self.average_ms()
            .filter(|ms| *ms > 0.0)
            .map(|ms| 1000.0 / ms)
    }
}
