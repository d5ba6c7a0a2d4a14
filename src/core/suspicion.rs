//! Rolling confidence and suspicion levels.
//!
//! Frame scores land in fixed-capacity FIFO buffers (about one second of
//! video); the published levels are the rounded buffer means.

use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Samples kept per buffer (~1 second at 30fps).
pub const ROLLING_CAPACITY: usize = 30;

/// Fixed-capacity FIFO of frame scores.
#[derive(Debug, Clone)]
pub struct RollingMean {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingMean {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a sample, evicting the oldest when full.
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Rounded mean clamped to [0, 100]; 0 when empty.
    pub fn level(&self) -> u8 {
        if self.samples.is_empty() {
            return 0;
        }
        let mean = self.samples.iter().mean();
        if !mean.is_finite() {
            return 0;
        }
        mean.round().clamp(0.0, 100.0) as u8
    }
}

/// Paired confidence and suspicion buffers.
#[derive(Debug, Clone)]
pub struct SuspicionAggregator {
    confidence: RollingMean,
    suspicion: RollingMean,
}

impl SuspicionAggregator {
    pub fn new() -> Self {
        Self {
            confidence: RollingMean::new(ROLLING_CAPACITY),
            suspicion: RollingMean::new(ROLLING_CAPACITY),
        }
    }

    pub fn push(&mut self, confidence: f64, suspicion: f64) {
        self.confidence.push(confidence);
        self.suspicion.push(suspicion);
    }

    pub fn confidence_level(&self) -> u8 {
        self.confidence.level()
    }

    pub fn suspicion_level(&self) -> u8 {
        self.suspicion.level()
    }
}

impl Default for SuspicionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_fifo() {
        let mut rolling = RollingMean::new(3);
        for v in [0.0, 0.0, 0.0, 90.0, 90.0, 90.0] {
            rolling.push(v);
        }
        assert_eq!(rolling.len(), 3);
        assert_eq!(rolling.level(), 90);
    }

    #[test]
    fn test_level_rounds() {
        let mut rolling = RollingMean::new(ROLLING_CAPACITY);
        rolling.push(70.0);
        rolling.push(5.0);
        // mean 37.5 rounds half away from zero
        assert_eq!(rolling.level(), 38);
    }

    #[test]
    fn test_empty_level() {
        assert_eq!(RollingMean::new(ROLLING_CAPACITY).level(), 0);
    }

    #[test]
    fn test_levels_stay_in_range() {
        let mut aggregator = SuspicionAggregator::new();
        for i in 0..500 {
            let confidence = [0.0, 5.0, 10.0, 20.0, 70.0, 90.0][i % 6];
            let suspicion = ((i * 37) % 101) as f64;
            aggregator.push(confidence, suspicion);
            assert!(aggregator.confidence_level() <= 100);
            assert!(aggregator.suspicion_level() <= 100);
        }
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let mut rolling = RollingMean::new(ROLLING_CAPACITY);
        for i in 0..100 {
            rolling.push(i as f64);
            assert!(rolling.len() <= ROLLING_CAPACITY);
        }
    }
}
